use crate::scanner::ProjectContext;

const SECTION_SEPARATOR: &str = "-----------------------------";

/// Caps file content for prompt embedding. The marker tells the backend the
/// file continues beyond what it sees.
pub fn truncate_content(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }
    // Don't split a UTF-8 sequence mid-character.
    let mut cut = limit;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n...[truncated]", &content[..cut])
}

/// Serializes the project context into a prompt section the backend can
/// reference files from: one block per file, path as header.
pub fn render_context(context: &ProjectContext, truncate_limit: usize) -> String {
    let mut out = String::from("The following is the project structure with file paths and contents:\n\n");
    for file in &context.files {
        out.push_str(&format!(
            "File: {}\nContent:\n{}\n{}\n",
            file.relative_path,
            truncate_content(&file.content, truncate_limit),
            SECTION_SEPARATOR
        ));
    }
    out
}

/// Prompt for `project update`: context, instruction, and the JSON convention
/// the response must follow so it can be parsed into discrete file writes.
pub fn build_update_prompt(
    context: &ProjectContext,
    instruction: &str,
    truncate_limit: usize,
) -> String {
    let mut prompt = render_context(context, truncate_limit);
    prompt.push_str(&format!("\nInstruction: {}\n\n", instruction));
    prompt.push_str(concat!(
        "Return your response in valid JSON format. For modifications, use:\n",
        "{\"modifications\": [\n",
        "    {\"filename\": \"<relative_path>\", \"new_content\": \"<new content>\"},\n",
        "    ...\n",
        "]}\n\n",
        "For file or directory creation, use:\n",
        "{\"creations\": [\n",
        "    {\"filename\": \"<relative_path>\", \"content\": \"<file content>\", \"is_directory\": <true/false>},\n",
        "    ...\n",
        "]}\n\n",
        "If no changes/creations are needed, return an empty JSON object with the corresponding key."
    ));
    prompt
}

/// Prompt for `bashcmd`: ask for exactly one shell command, nothing else.
pub fn build_bashcmd_prompt(instruction: &str) -> String {
    format!(
        "Provide the single bash command that accomplishes the following: {}. \
         Return only the command, with no explanation and no formatting.",
        instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ProjectFile;
    use std::path::PathBuf;

    fn sample_context() -> ProjectContext {
        ProjectContext {
            root: PathBuf::from("."),
            files: vec![
                ProjectFile {
                    relative_path: "index.html".to_string(),
                    content: "<html></html>".to_string(),
                },
                ProjectFile {
                    relative_path: "src/app.js".to_string(),
                    content: "console.log('hi');".to_string(),
                },
            ],
        }
    }

    #[test]
    fn truncation_appends_marker_only_when_needed() {
        assert_eq!(truncate_content("short", 500), "short");
        let long = "x".repeat(600);
        let truncated = truncate_content(&long, 500);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.starts_with(&"x".repeat(500)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo wörld".repeat(100);
        let truncated = truncate_content(&s, 501);
        assert!(truncated.ends_with("...[truncated]"));
    }

    #[test]
    fn context_rendering_names_every_file() {
        let rendered = render_context(&sample_context(), 500);
        assert!(rendered.contains("File: index.html"));
        assert!(rendered.contains("File: src/app.js"));
        assert!(rendered.contains("console.log('hi');"));
    }

    #[test]
    fn update_prompt_states_the_json_convention() {
        let prompt = build_update_prompt(&sample_context(), "add a footer", 500);
        assert!(prompt.contains("Instruction: add a footer"));
        assert!(prompt.contains("\"modifications\""));
        assert!(prompt.contains("\"creations\""));
        assert!(prompt.contains("is_directory"));
    }

    #[test]
    fn bashcmd_prompt_asks_for_a_single_command() {
        let prompt = build_bashcmd_prompt("create a blank notes.txt");
        assert!(prompt.contains("create a blank notes.txt"));
        assert!(prompt.contains("Return only the command"));
    }
}
