use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Compilation failed for target {target} (exit code {code}){}", diagnostics(.stderr))]
    CompileFailure {
        target: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} failed for target {target} (exit code {code}){}", diagnostics(.stderr))]
    PackagerFailure {
        tool: String,
        target: String,
        code: i32,
        stderr: String,
    },

    #[error("Descriptor template {} is unreadable: {source}", .path.display())]
    TemplateMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File system error at {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to execute '{program}'. Is it installed? ({source})")]
    ToolNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReleaseError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReleaseError::FileSystem {
            path: path.into(),
            source,
        }
    }
}

fn diagnostics(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
