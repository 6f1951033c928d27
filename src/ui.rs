use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Lines of old/new beyond which the diff preview falls back to a summary
/// instead of an O(n*m) line comparison.
const DIFF_LINE_CAP: usize = 2000;

const BANNER: &str = r#"
▄ •▄       ·▄▄▄▄   ▄· ▄▌
█▌▄▌▪▪     ██▪ ██ ▐█▪██▌
▐▀▀▄· ▄█▀▄ ▐█· ▐█▌▐█▌▐█▪
▐█.█▌▐█▌.▐▌██. ██  ▐█▀·.
·▀  ▀ ▀█▄▀▪▀▀▀▀▀•   ▀ •

Interactive AI Project CLI Tool - KODY
"#;

/// Console output helpers for the REPL. One instance per app; the color
/// switch is applied process-wide, matching how `--no-color` behaves.
pub struct Ui {
    colors_enabled: bool,
}

impl Ui {
    pub fn new(colors_enabled: bool) -> Self {
        if !colors_enabled {
            colored::control::set_override(false);
        }
        Self { colors_enabled }
    }

    pub fn print_banner(&self) {
        println!("{}", BANNER.cyan().bold());
    }

    pub fn print_success(&self, message: &str) {
        println!("{}", message.green());
    }

    pub fn print_info(&self, message: &str) {
        println!("{}", message.cyan());
    }

    pub fn print_warning(&self, message: &str) {
        println!("{}", message.yellow());
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{}", message.red());
    }

    /// Spinner shown while a backend call is in flight. Caller finishes it.
    pub fn thinking(&self, message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        if self.colors_enabled {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        spinner
    }
}

/// Indents every line of a block with the chat arrow, the way replies are
/// framed at the prompt.
pub fn arrow_wrap(text: &str) -> String {
    text.lines()
        .map(|line| format!("  → {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Unified-style preview of a proposed modification: `-` for dropped lines,
/// `+` for added ones, two columns of context untouched. Falls back to a
/// one-line summary for very large files.
pub fn diff_preview(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    if old_lines.len() > DIFF_LINE_CAP || new_lines.len() > DIFF_LINE_CAP {
        return format!(
            "content replaced ({} -> {} lines, diff too large to preview)",
            old_lines.len(),
            new_lines.len()
        );
    }

    let mut out = Vec::new();
    for op in diff_ops(&old_lines, &new_lines) {
        match op {
            DiffOp::Keep(line) => out.push(format!("  {line}")),
            DiffOp::Remove(line) => out.push(format!("{}", format!("- {line}").red())),
            DiffOp::Add(line) => out.push(format!("{}", format!("+ {line}").green())),
        }
    }
    out.join("\n")
}

enum DiffOp<'a> {
    Keep(&'a str),
    Remove(&'a str),
    Add(&'a str),
}

/// Longest-common-subsequence walk over the two line lists.
fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<DiffOp<'a>> {
    let n = old.len();
    let m = new.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(DiffOp::Keep(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(DiffOp::Remove(old[i]));
            i += 1;
        } else {
            ops.push(DiffOp::Add(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().copied().map(DiffOp::Remove));
    ops.extend(new[j..].iter().copied().map(DiffOp::Add));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn arrow_wrap_prefixes_each_line() {
        assert_eq!(arrow_wrap("one\ntwo"), "  → one\n  → two");
    }

    #[test]
    fn diff_marks_added_and_removed_lines() {
        plain();
        let preview = diff_preview("a\nb\nc", "a\nx\nc");
        assert!(preview.contains("- b"));
        assert!(preview.contains("+ x"));
        assert!(preview.contains("  a"));
        assert!(preview.contains("  c"));
    }

    #[test]
    fn diff_of_identical_content_has_no_markers() {
        plain();
        let preview = diff_preview("same\nlines", "same\nlines");
        assert!(!preview.contains("- "));
        assert!(!preview.contains("+ "));
    }

    #[test]
    fn diff_of_new_file_is_all_additions() {
        plain();
        let preview = diff_preview("", "first\nsecond");
        assert!(preview.contains("+ first"));
        assert!(preview.contains("+ second"));
    }

    #[test]
    fn oversized_diff_degrades_to_summary() {
        plain();
        let big: String = (0..3000).map(|i| format!("line {i}\n")).collect();
        let preview = diff_preview(&big, "small");
        assert!(preview.contains("too large"));
    }
}
