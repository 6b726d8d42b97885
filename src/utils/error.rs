use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PopError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required files: {}", .files.join(", "))]
    MissingResources { files: Vec<String> },

    #[error("{tool} not found at {}", .path.display())]
    ToolNotFound { tool: String, path: PathBuf },

    #[error("{tool} failed (exit code {}): {stderr}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Expected output was not produced: {}", .path.display())]
    OutputMissing { path: PathBuf },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported disc image format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("Game not found: {title}")]
    GameNotFound { title: String },

    #[error("A game named '{title}' already exists")]
    DuplicateGame { title: String },

    #[error("Library is empty: {}", .path.display())]
    EmptyLibrary { path: PathBuf },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ExternalTool,
    FileSystem,
    Library,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PopError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PopError::ConfigError { .. }
            | PopError::ConfigValidationError { .. }
            | PopError::MissingConfigError { .. }
            | PopError::InvalidConfigValueError { .. }
            | PopError::MissingResources { .. } => ErrorCategory::Configuration,
            PopError::ToolNotFound { .. }
            | PopError::ToolFailed { .. }
            | PopError::OutputMissing { .. } => ErrorCategory::ExternalTool,
            PopError::IoError(_) | PopError::FileNotFound { .. } => ErrorCategory::FileSystem,
            PopError::GameNotFound { .. }
            | PopError::DuplicateGame { .. }
            | PopError::EmptyLibrary { .. } => ErrorCategory::Library,
            PopError::CsvError(_)
            | PopError::SerializationError(_)
            | PopError::UnsupportedFormat { .. }
            | PopError::UnsupportedConversion { .. }
            | PopError::ValidationError { .. }
            | PopError::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PopError::EmptyLibrary { .. } => ErrorSeverity::Low,
            PopError::ToolFailed { .. } | PopError::OutputMissing { .. } => ErrorSeverity::Medium,
            PopError::IoError(_) | PopError::MissingResources { .. } | PopError::ToolNotFound { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PopError::MissingResources { .. } => {
                "Place POPS.ELF, the BIOS and SLOT0/SLOT1.VMC in the tools directory (--tools-dir)"
            }
            PopError::ToolNotFound { .. } => {
                "Copy the converter executable next to popcraft or point --tools-dir at it"
            }
            PopError::ToolFailed { .. } | PopError::OutputMissing { .. } => {
                "Check that the source image is intact and re-run with --verbose to see the tool output"
            }
            PopError::FileNotFound { .. } => {
                "Check the path; .cue and .bin files must sit side by side with the same name"
            }
            PopError::UnsupportedFormat { .. } | PopError::UnsupportedConversion { .. } => {
                "Run `popcraft transcode --help` for the supported conversions"
            }
            PopError::GameNotFound { .. } | PopError::EmptyLibrary { .. } => {
                "Run `popcraft list` to see the installed games"
            }
            PopError::DuplicateGame { .. } => "Choose a name that is not used by another game",
            PopError::ConfigError { .. }
            | PopError::ConfigValidationError { .. }
            | PopError::MissingConfigError { .. }
            | PopError::InvalidConfigValueError { .. } => {
                "Check the command line flags and the popcraft.toml settings"
            }
            PopError::IoError(_) => "Check that the target drive is mounted and writable",
            _ => "Re-run with --verbose for more details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PopError::IoError(e) => format!("File operation failed: {}", e),
            PopError::ToolFailed { tool, .. } => format!("{} could not convert the image", tool),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PopError>;
