use std::path::{Component, Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PlanError;

/// A parsed `project update` response: the set of file writes the AI
/// proposes. Absent keys default to empty, matching the prompt convention.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdatePlan {
    #[serde(default)]
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub creations: Vec<Creation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Modification {
    pub filename: String,
    pub new_content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Creation {
    pub filename: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_directory: bool,
}

/// What an applied plan actually touched.
#[derive(Debug, Default, PartialEq)]
pub struct ApplySummary {
    pub files_written: Vec<String>,
    pub dirs_created: Vec<String>,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty() && self.creations.is_empty()
    }

    /// Parses an AI response into a plan. Tolerates markdown fences and
    /// surrounding prose. Backends routinely emit raw newlines inside the
    /// content string fields, which strict JSON forbids; those are repaired
    /// and the parse retried before a failure is reported.
    pub fn from_response(response: &str) -> Result<Self, PlanError> {
        let json = extract_json(response).ok_or(PlanError::NoJson)?;
        match serde_json::from_str(&json) {
            Ok(plan) => Ok(plan),
            Err(first_err) => {
                let repaired = repair_content_fields(&json);
                serde_json::from_str(&repaired).map_err(|_| PlanError::Parse(first_err))
            }
        }
    }

    /// Rejects any target that would land outside the project root: lexically
    /// (absolute paths, `..` components) and after resolving symlinks in the
    /// target's existing ancestors, so a symlinked directory inside the
    /// project cannot redirect a write outside it. Runs over the whole plan
    /// before a single byte is written.
    pub fn validate_paths(&self, root: &Path) -> Result<(), PlanError> {
        let targets = self
            .modifications
            .iter()
            .map(|m| m.filename.as_str())
            .chain(self.creations.iter().map(|c| c.filename.as_str()));
        for target in targets {
            if !is_contained(target) || !resolves_within(root, target) {
                return Err(PlanError::PathEscape(target.to_string()));
            }
            debug!(target, root = %root.display(), "plan target accepted");
        }
        Ok(())
    }

    /// Applies the plan under `root`. Call `validate_paths` first; this
    /// method re-checks as a final guard. Each file lands via a temp file in
    /// the target directory followed by a rename, so an interrupted apply
    /// never leaves a half-written file.
    pub fn apply(&self, root: &Path) -> Result<ApplySummary> {
        self.validate_paths(root)?;

        let mut summary = ApplySummary::default();

        for creation in &self.creations {
            let target = root.join(&creation.filename);
            if creation.is_directory {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("failed to create directory {}", creation.filename))?;
                summary.dirs_created.push(creation.filename.clone());
            } else {
                write_atomic(root, &target, &creation.content)
                    .with_context(|| format!("failed to create {}", creation.filename))?;
                summary.files_written.push(creation.filename.clone());
            }
        }

        for modification in &self.modifications {
            let target = root.join(&modification.filename);
            write_atomic(root, &target, &modification.new_content)
                .with_context(|| format!("failed to update {}", modification.filename))?;
            summary.files_written.push(modification.filename.clone());
        }

        Ok(summary)
    }
}

/// Pulls the outermost JSON object out of a free-form AI response: markdown
/// fences are dropped, then everything from the first `{` to the last `}`.
pub fn extract_json(response: &str) -> Option<String> {
    let cleaned = response.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_string())
}

/// A relative path is contained iff it is non-empty, not absolute, and never
/// steps up through `..`. Works on paths that don't exist yet.
fn is_contained(target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    let path = Path::new(target);
    if path.is_absolute() {
        return false;
    }
    path.components().all(|c| match c {
        Component::Normal(_) | Component::CurDir => true,
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => false,
    })
}

/// The lexical check above cannot see symlinks. This one canonicalizes the
/// deepest existing ancestor of the target and requires it to stay under the
/// canonicalized root, so `link/file.txt` with `link -> ../outside` is
/// rejected. A root that cannot be canonicalized is left to fail at apply
/// time.
fn resolves_within(root: &Path, target: &str) -> bool {
    let resolved_root = match root.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => return true,
    };
    let mut probe = root.join(target);
    let resolved = loop {
        match probe.canonicalize() {
            Ok(resolved) => break resolved,
            Err(_) => match probe.parent() {
                Some(parent) => probe = parent.to_path_buf(),
                None => return false,
            },
        }
    };
    resolved.starts_with(&resolved_root)
}

const CONTENT_KEYS: [&str; 2] = ["\"new_content\"", "\"content\""];

/// Re-escapes raw control characters inside the string values of the two
/// content-bearing keys, leaving everything else for the parser to judge.
fn repair_content_fields(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut i = 0;
    while i < raw.len() {
        if let Some(value_start) = match_content_key(&raw[i..]) {
            out.push_str(&raw[i..i + value_start]);
            i += value_start;
            i += escape_value_into(&raw[i..], &mut out);
        } else {
            match raw[i..].chars().next() {
                Some(ch) => {
                    out.push(ch);
                    i += ch.len_utf8();
                }
                None => break,
            }
        }
    }
    out
}

/// When `rest` opens with a content key followed by `:` and a quote, returns
/// the byte length up to and including that opening quote.
fn match_content_key(rest: &str) -> Option<usize> {
    let key = CONTENT_KEYS.iter().find(|k| rest.starts_with(**k))?;
    let bytes = rest.as_bytes();
    let mut i = key.len();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'"') {
        return None;
    }
    Some(i + 1)
}

/// Copies a JSON string value into `out` up to its closing quote, escaping
/// raw control characters on the way. Existing escape sequences pass through
/// untouched. Returns the bytes consumed, closing quote included.
fn escape_value_into(rest: &str, out: &mut String) -> usize {
    let mut chars = rest.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                out.push('\\');
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                out.push('"');
                return i + 1;
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    rest.len()
}

fn write_atomic(root: &Path, target: &Path, content: &str) -> Result<()> {
    let parent = target.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)?;
    }
    let dir: &Path = parent.unwrap_or(root);
    let temp = NamedTempFile::new_in(dir)?;
    std::fs::write(temp.path(), content)?;
    temp.persist(target)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn extracts_json_from_fenced_response() {
        let response = "Here you go:\n```json\n{\"modifications\": []}\n```\nDone.";
        assert_eq!(extract_json(response).unwrap(), "{\"modifications\": []}");
    }

    #[test]
    fn extracts_bare_json() {
        let response = "{\"creations\": []}";
        assert_eq!(extract_json(response).unwrap(), "{\"creations\": []}");
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json("I couldn't do that, sorry.").is_none());
    }

    #[test]
    fn parses_modifications_and_creations() {
        let response = r#"{
            "modifications": [{"filename": "index.html", "new_content": "<html>"}],
            "creations": [
                {"filename": "assets", "is_directory": true},
                {"filename": "assets/app.css", "content": "body {}"}
            ]
        }"#;
        let plan = UpdatePlan::from_response(response).unwrap();
        assert_eq!(plan.modifications.len(), 1);
        assert_eq!(plan.creations.len(), 2);
        assert!(plan.creations[0].is_directory);
        assert_eq!(plan.creations[1].content, "body {}");
    }

    #[test]
    fn empty_object_is_an_empty_plan() {
        let plan = UpdatePlan::from_response("{}").unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = UpdatePlan::from_response("{\"modifications\": [oops]}").unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn raw_newlines_in_content_fields_are_repaired() {
        let response =
            "{\"modifications\": [{\"filename\": \"a.txt\", \"new_content\": \"line1\nline2\"}]}";
        let plan = UpdatePlan::from_response(response).unwrap();
        assert_eq!(plan.modifications[0].new_content, "line1\nline2");
    }

    #[test]
    fn raw_tabs_and_existing_escapes_coexist_in_repaired_content() {
        let response =
            "{\"creations\": [{\"filename\": \"b.txt\", \"content\": \"a\tb \\\"quoted\\\" c\"}]}";
        let plan = UpdatePlan::from_response(response).unwrap();
        assert_eq!(plan.creations[0].content, "a\tb \"quoted\" c");
    }

    #[test]
    fn repair_covers_multiline_content_in_a_fenced_reply() {
        let response = "```json\n{\"creations\": [{\"filename\": \"notes.txt\", \"content\": \"first\nsecond\nthird\"}]}\n```";
        let plan = UpdatePlan::from_response(response).unwrap();
        assert_eq!(plan.creations[0].content, "first\nsecond\nthird");
    }

    #[test]
    fn repair_leaves_other_malformations_to_the_parser() {
        // The filename field is not content-bearing; a raw newline there
        // stays broken and the original parse error is reported.
        let response = "{\"modifications\": [{\"filename\": \"a\n.txt\", \"new_content\": \"x\"}]}";
        let err = UpdatePlan::from_response(response).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn parent_dir_targets_are_rejected() {
        let plan = UpdatePlan {
            modifications: vec![Modification {
                filename: "../outside.txt".to_string(),
                new_content: "x".to_string(),
            }],
            creations: vec![],
        };
        let err = plan.validate_paths(Path::new("/tmp/project")).unwrap_err();
        assert!(matches!(err, PlanError::PathEscape(p) if p == "../outside.txt"));
    }

    #[test]
    fn sneaky_interior_parent_dir_is_rejected() {
        let plan = UpdatePlan {
            creations: vec![Creation {
                filename: "src/../../escape.txt".to_string(),
                content: String::new(),
                is_directory: false,
            }],
            modifications: vec![],
        };
        assert!(plan.validate_paths(Path::new("/tmp/project")).is_err());
    }

    #[test]
    fn absolute_targets_are_rejected() {
        let plan = UpdatePlan {
            creations: vec![Creation {
                filename: "/etc/evil".to_string(),
                content: String::new(),
                is_directory: false,
            }],
            modifications: vec![],
        };
        assert!(plan.validate_paths(Path::new("/tmp/project")).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_dir_cannot_redirect_writes_outside_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("project");
        let victim = outer.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&victim).unwrap();
        std::os::unix::fs::symlink(&victim, root.join("link")).unwrap();

        let plan = UpdatePlan {
            creations: vec![Creation {
                filename: "link/escaped.txt".to_string(),
                content: "no".to_string(),
                is_directory: false,
            }],
            modifications: vec![],
        };

        assert!(matches!(
            plan.validate_paths(&root),
            Err(PlanError::PathEscape(_))
        ));
        assert!(plan.apply(&root).is_err());
        assert!(!victim.join("escaped.txt").exists());
    }

    #[test]
    #[cfg(unix)]
    fn symlink_staying_inside_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let plan = UpdatePlan {
            creations: vec![Creation {
                filename: "alias/file.txt".to_string(),
                content: "ok".to_string(),
                is_directory: false,
            }],
            modifications: vec![],
        };

        plan.validate_paths(dir.path()).unwrap();
        plan.apply(dir.path()).unwrap();
        assert!(dir.path().join("real/file.txt").exists());
    }

    #[test]
    fn apply_refuses_escaping_plan_without_writing() {
        let dir = TempDir::new().unwrap();
        let plan = UpdatePlan {
            modifications: vec![Modification {
                filename: "../escape.txt".to_string(),
                new_content: "x".to_string(),
            }],
            creations: vec![],
        };
        assert!(plan.apply(dir.path()).is_err());
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn apply_writes_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "old").unwrap();

        let plan = UpdatePlan {
            modifications: vec![Modification {
                filename: "index.html".to_string(),
                new_content: "new".to_string(),
            }],
            creations: vec![
                Creation {
                    filename: "assets".to_string(),
                    content: String::new(),
                    is_directory: true,
                },
                Creation {
                    filename: "src/app.js".to_string(),
                    content: "console.log(1);".to_string(),
                    is_directory: false,
                },
            ],
        };

        let summary = plan.apply(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "new"
        );
        assert!(dir.path().join("assets").is_dir());
        assert_eq!(
            fs::read_to_string(dir.path().join("src/app.js")).unwrap(),
            "console.log(1);"
        );
        assert_eq!(summary.files_written.len(), 2);
        assert_eq!(summary.dirs_created, vec!["assets".to_string()]);
    }

    #[test]
    fn apply_creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let plan = UpdatePlan {
            creations: vec![Creation {
                filename: "deeply/nested/file.txt".to_string(),
                content: "hi".to_string(),
                is_directory: false,
            }],
            modifications: vec![],
        };
        plan.apply(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("deeply/nested/file.txt")).unwrap(),
            "hi"
        );
    }
}
