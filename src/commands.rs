/// Everything a REPL input line can mean. Produced fresh per line by
/// [`Command::parse`]; handlers match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    ShowFile(String),
    ProjectList,
    ProjectRefresh,
    ProjectUpdate(String),
    BashCmd(String),
    Exec(String),
    Help,
    Exit,
    Unknown(String),
}

impl Command {
    /// Classifies one input line. Keywords are case-insensitive and tolerate
    /// surrounding whitespace. An empty line parses to `None` (re-prompt).
    /// A keyword missing its required argument, or anything unrecognized, is
    /// `Unknown` so the loop can complain and continue.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (line, ""),
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "exit" | "quit" => Command::Exit,
            "help" | "usage" => Command::Help,
            "project-list" => Command::ProjectList,
            "project-refresh" => Command::ProjectRefresh,
            "chat" => Self::with_arg(rest, line, Command::Chat),
            "show-file" => Self::with_arg(rest, line, Command::ShowFile),
            "bashcmd" => Self::with_arg(rest, line, Command::BashCmd),
            "exec" => Self::with_arg(rest, line, Command::Exec),
            "project" => match rest.split_once(char::is_whitespace) {
                Some((sub, instruction)) if sub.eq_ignore_ascii_case("update") => {
                    Self::with_arg(instruction.trim(), line, Command::ProjectUpdate)
                }
                _ => Command::Unknown(line.to_string()),
            },
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }

    fn with_arg(arg: &str, raw: &str, build: impl FnOnce(String) -> Command) -> Command {
        if arg.is_empty() {
            Command::Unknown(raw.to_string())
        } else {
            build(arg.to_string())
        }
    }
}
