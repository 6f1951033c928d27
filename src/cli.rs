use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::backend::{self, AiBackend};
use crate::commands::Command;
use crate::config::CliConfig;
use crate::context::ContextCache;
use crate::plan::UpdatePlan;
use crate::prompt;
use crate::scanner::{ProjectContext, ProjectScanner};
use crate::shell;
use crate::ui::{arrow_wrap, diff_preview, Ui};

const HELP_TEXT: &str = "\
KODY - Interactive AI Project CLI Tool

Commands:
  chat <message>              General conversation with the AI.
  show-file <filename>        Display a file's content.
  project-list                List all project files.
  project-refresh             Re-scan the current directory for files.
  project update <instr>      Ask the AI to modify or create project files.
                              Proposed changes are previewed and confirmed
                              before anything is written.
  bashcmd <instr>             Ask the AI for a single shell command. The
                              command is printed, never executed; run it
                              yourself with `exec`.
  exec <shell command>        Execute a shell command. The command runs
                              unsandboxed with your full permissions.
  help | usage                Show these instructions.
  exit | quit                 Exit kody.
";

/// The interactive command loop. One command is fully processed before the
/// next line is read; per-command failures are printed and the loop
/// continues.
pub struct CliApp {
    config: CliConfig,
    cache: ContextCache,
    backend: Option<Box<dyn AiBackend>>,
    ui: Ui,
    root: PathBuf,
    assume_yes: bool,
}

impl CliApp {
    pub fn new(config: CliConfig, root: PathBuf, colors_enabled: bool, assume_yes: bool) -> Self {
        let scanner = ProjectScanner::new(&config.scanning);
        let cache = ContextCache::new(scanner, root.clone());
        Self {
            config,
            cache,
            backend: None,
            ui: Ui::new(colors_enabled),
            root,
            assume_yes,
        }
    }

    /// Runs the REPL until `exit`/`quit` or EOF.
    pub async fn run(&mut self) -> Result<()> {
        self.ui.print_banner();
        self.ui
            .print_info("Type 'help' for commands. Working directory is the project root.");

        loop {
            print!("kody> ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            if read == 0 {
                // EOF: treated like exit.
                println!();
                break;
            }

            let command = match Command::parse(&line) {
                Some(command) => command,
                None => continue,
            };

            if matches!(command, Command::Exit) {
                self.ui.print_success("Goodbye!");
                break;
            }

            if let Err(e) = self.dispatch(command).await {
                self.ui.print_error(&format!("{e:#}"));
            }
        }

        Ok(())
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Chat(message) => self.cmd_chat(&message).await,
            Command::ShowFile(filename) => self.cmd_show_file(&filename),
            Command::ProjectList => self.cmd_project_list(),
            Command::ProjectRefresh => self.cmd_project_refresh(),
            Command::ProjectUpdate(instruction) => self.cmd_project_update(&instruction).await,
            Command::BashCmd(instruction) => self.cmd_bashcmd(&instruction).await,
            Command::Exec(command) => self.cmd_exec(&command).await,
            Command::Help => {
                println!("{HELP_TEXT}");
                Ok(())
            }
            Command::Exit => Ok(()),
            Command::Unknown(raw) => {
                self.ui
                    .print_warning(&format!("Command not recognized: {raw}"));
                self.ui.print_info("Type 'help' for the list of commands.");
                Ok(())
            }
        }
    }

    async fn cmd_chat(&mut self, message: &str) -> Result<()> {
        println!("{}", arrow_wrap(&format!("User: {message}")));
        let response = self.send_with_spinner(message).await?;
        println!("{}", arrow_wrap(&format!("AI: {response}")));
        Ok(())
    }

    fn cmd_show_file(&mut self, filename: &str) -> Result<()> {
        // Prefer the scanned snapshot; fall back to disk for files the
        // ignore rules keep out of the context.
        let from_context = self.cache.get()?.get(filename).map(str::to_string);
        let content = match from_context {
            Some(content) => content,
            None => match std::fs::read_to_string(self.root.join(filename)) {
                Ok(content) => content,
                Err(_) => {
                    self.ui.print_error(&format!("File not found: {filename}"));
                    return Ok(());
                }
            },
        };
        println!("\n{}\n", arrow_wrap(&content));
        Ok(())
    }

    fn cmd_project_list(&mut self) -> Result<()> {
        let context = self.cache.get()?;
        let listing: Vec<String> = context.paths().map(|p| format!(" - {p}")).collect();
        println!(
            "\n{}\n",
            arrow_wrap(&format!("Project Files:\n{}", listing.join("\n")))
        );
        Ok(())
    }

    fn cmd_project_refresh(&mut self) -> Result<()> {
        let count = self.cache.refresh()?;
        self.ui
            .print_success(&format!("Project context refreshed. Total files: {count}"));
        Ok(())
    }

    async fn cmd_project_update(&mut self, instruction: &str) -> Result<()> {
        let context = self.cache.get()?.clone();
        let update_prompt =
            prompt::build_update_prompt(&context, instruction, self.config.scanning.truncate_limit);

        let response = self.send_with_spinner(&update_prompt).await?;

        let plan = match UpdatePlan::from_response(&response) {
            Ok(plan) => plan,
            Err(e) => {
                self.ui
                    .print_error(&format!("Failed to parse AI response: {e}"));
                self.ui.print_info("Raw response:");
                println!("{response}");
                return Ok(());
            }
        };

        if plan.is_empty() {
            self.ui.print_info("The AI proposed no changes.");
            return Ok(());
        }

        // All targets are checked before anything is previewed or written.
        if let Err(e) = plan.validate_paths(&self.root) {
            self.ui.print_error(&e.to_string());
            return Ok(());
        }

        self.preview_plan(&plan, &context);

        let total = plan.modifications.len() + plan.creations.len();
        if !self.confirm(&format!("Apply {total} change(s)? (y/n): "))? {
            self.ui.print_warning("Update cancelled. Nothing was written.");
            return Ok(());
        }

        let summary = plan.apply(&self.root)?;
        info!(
            files = summary.files_written.len(),
            dirs = summary.dirs_created.len(),
            "project update applied"
        );
        for path in &summary.dirs_created {
            self.ui.print_success(&format!("Created directory {path}"));
        }
        for path in &summary.files_written {
            self.ui.print_success(&format!("Wrote {path}"));
        }

        // Keep the snapshot in sync with what just landed on disk.
        self.cache.refresh()?;
        Ok(())
    }

    fn preview_plan(&self, plan: &UpdatePlan, context: &ProjectContext) {
        for modification in &plan.modifications {
            self.ui.print_warning(&format!(
                "\n--- Proposed modification for {} ---",
                modification.filename
            ));
            let old = context.get(&modification.filename).unwrap_or("");
            println!("{}", diff_preview(old, &modification.new_content));
        }
        for creation in &plan.creations {
            if creation.is_directory {
                self.ui.print_warning(&format!(
                    "\n--- Proposed directory creation: {} ---",
                    creation.filename
                ));
            } else {
                self.ui.print_warning(&format!(
                    "\n--- Proposed file creation: {} ---",
                    creation.filename
                ));
                println!(
                    "{}",
                    prompt::truncate_content(&creation.content, self.config.scanning.truncate_limit)
                );
            }
        }
        println!();
    }

    async fn cmd_bashcmd(&mut self, instruction: &str) -> Result<()> {
        let bash_prompt = prompt::build_bashcmd_prompt(instruction);
        let response = self.send_with_spinner(&bash_prompt).await?;
        let command = response.trim();
        println!("{}", arrow_wrap(&format!("Suggested command: {command}")));
        self.ui
            .print_info(&format!("Not executed. To run it: exec {command}"));
        Ok(())
    }

    async fn cmd_exec(&mut self, command: &str) -> Result<()> {
        let output = shell::run(command).await?;
        if !output.stdout.is_empty() {
            print!("{}", output.stdout);
        }
        if !output.stderr.is_empty() {
            eprint!("{}", output.stderr);
        }
        if output.success() {
            self.ui.print_success("Command exited with status 0");
        } else {
            self.ui
                .print_warning(&format!("Command exited with status {}", output.code));
        }
        Ok(())
    }

    async fn send_with_spinner(&mut self, prompt_text: &str) -> Result<String> {
        // The backend is built on first use so a missing API key only
        // matters once an AI-bearing command runs.
        if self.backend.is_none() {
            self.backend = Some(backend::from_config(&self.config.ai)?);
        }
        let backend = self
            .backend
            .as_ref()
            .expect("backend populated by the branch above");

        let spinner = self.ui.thinking("Lemme think...");
        let result = backend.send(prompt_text).await;
        spinner.finish_and_clear();

        Ok(result?)
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        print!("{question}");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    #[cfg(test)]
    pub(crate) fn with_backend(mut self, backend: Box<dyn AiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}
