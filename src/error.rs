use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PrepError {
    #[error("invalid dataset configuration: {0}")]
    #[diagnostic(help("check the source URL and split layout of the dataset"))]
    Configuration(String),

    #[error("missing config file dataset.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download failed: {0}")]
    TransportHttp(String),

    #[error("server returned status {status}: {message}")]
    TransportStatus { status: u16, message: String },

    #[error("archive extraction failed: {0}")]
    Archive(String),

    #[error("unrecognized archive format: {0}")]
    UnsupportedArchive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("unsupported file format for loading: {0}")]
    UnsupportedFormat(String),

    #[error("failed to load table: {0}")]
    Table(String),

    #[error("task {id} ({name}) failed: {message}")]
    TaskFailed {
        id: u32,
        name: String,
        message: String,
    },
}

/// Coarse classification used by callers deciding whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Archive,
    Filesystem,
    Load,
    Task,
}

impl PrepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrepError::Configuration(_)
            | PrepError::MissingConfig
            | PrepError::ConfigRead(_)
            | PrepError::ConfigParse(_) => ErrorKind::Configuration,
            PrepError::TransportHttp(_) | PrepError::TransportStatus { .. } => {
                ErrorKind::Transport
            }
            PrepError::Archive(_) | PrepError::UnsupportedArchive(_) => ErrorKind::Archive,
            PrepError::Filesystem(_) => ErrorKind::Filesystem,
            PrepError::UnsupportedFormat(_) | PrepError::Table(_) => ErrorKind::Load,
            PrepError::TaskFailed { .. } => ErrorKind::Task,
        }
    }

    /// Transport and archive failures leave no marker behind, so the same call can be repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_kinds() {
        assert_eq!(
            PrepError::Configuration("dup".to_string()).kind(),
            ErrorKind::Configuration
        );
        let status = PrepError::TransportStatus {
            status: 503,
            message: "busy".to_string(),
        };
        assert_eq!(status.kind(), ErrorKind::Transport);
        assert!(status.is_retryable());
        assert!(!PrepError::Filesystem("denied".to_string()).is_retryable());
    }
}
