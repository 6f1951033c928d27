pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod plan;
pub mod prompt;
pub mod scanner;
pub mod shell;
pub mod ui;

// Re-export commonly used types
pub use backend::AiBackend;
pub use cli::CliApp;
pub use commands::Command;
pub use config::{BackendKind, CliConfig};
pub use context::ContextCache;
pub use error::{BackendError, PlanError};
pub use plan::UpdatePlan;
pub use scanner::{ProjectContext, ProjectFile, ProjectScanner};
pub use shell::ShellOutput;
