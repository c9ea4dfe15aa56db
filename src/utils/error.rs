use crate::domain::model::RunSummary;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Malformed roster: {message}")]
    MalformedRoster { message: String },

    #[error("No name placement marker found on template: {message}")]
    LayoutNotFound { message: String },

    #[error("Dispatch session failed, remaining sends aborted: {reason}")]
    DispatchSession {
        reason: String,
        summary: Box<RunSummary>,
    },

    #[error("Font asset '{path}' could not be loaded: {reason}")]
    FontAsset { path: String, reason: String },

    #[error("Certificate could not be rendered: {0}")]
    Render(#[from] RenderError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },
}

/// 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Template,
    Rendering,
    Dispatch,
    Configuration,
    System,
}

/// 錯誤嚴重程度，決定 CLI 的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CertError::MalformedRoster { .. } | CertError::CsvError(_) | CertError::SpreadsheetError(_) => {
                ErrorCategory::Input
            }
            CertError::LayoutNotFound { .. } | CertError::ImageError(_) => ErrorCategory::Template,
            CertError::FontAsset { .. } | CertError::Render(_) => ErrorCategory::Rendering,
            CertError::DispatchSession { .. } => ErrorCategory::Dispatch,
            CertError::ConfigError { .. }
            | CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. }
            | CertError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CertError::IoError(_) | CertError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Dispatch => ErrorSeverity::Medium,
            ErrorCategory::Input
            | ErrorCategory::Template
            | ErrorCategory::Rendering
            | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CertError::MalformedRoster { .. } | CertError::CsvError(_) | CertError::SpreadsheetError(_) => {
                "Check that the roster is a .csv, .tsv, .xlsx or .xls file with 'Name' and 'Email' header columns"
                    .to_string()
            }
            CertError::LayoutNotFound { .. } => {
                "Add a solid dark underline where the name belongs, or set [layout.fixed] coordinates"
                    .to_string()
            }
            CertError::ImageError(_) => "Make sure the template is a readable PNG or JPEG image".to_string(),
            CertError::DispatchSession { .. } => {
                "Verify the sender address and app password, then re-run the send".to_string()
            }
            CertError::FontAsset { .. } => "Point [fonts] at existing TrueType/OpenType files".to_string(),
            CertError::Render(RenderError::NameOverflow { .. }) => {
                "Lower render.min_font_size or widen the name box".to_string()
            }
            CertError::Render(_) => "Check the participant name and that the output directory is writable".to_string(),
            CertError::ConfigError { .. }
            | CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. }
            | CertError::MissingConfigError { .. } => {
                "Review the configuration file against the documented sections".to_string()
            }
            CertError::IoError(_) => "Check file permissions and that the output directory is writable".to_string(),
            CertError::SerializationError(_) => "Retry the run; the manifest could not be encoded".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CertError::MalformedRoster { message } => format!("The participant list is not usable: {}", message),
            CertError::LayoutNotFound { .. } => {
                "The template has no detectable name underline; no certificates were generated".to_string()
            }
            CertError::DispatchSession { reason, summary } => format!(
                "Sending stopped after {} of {} emails: {}",
                summary.sent, summary.total, reason
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CertError>;

/// Record-scoped rendering failure. Recorded in the run summary, never aborts the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("participant name is empty")]
    EmptyName,

    #[error("name '{name}' is {width:.0}px wide at the minimum size {min_size}, box allows {box_width}px")]
    NameOverflow {
        name: String,
        min_size: f32,
        width: f32,
        box_width: u32,
    },

    #[error("document export failed: {reason}")]
    Export { reason: String },

    #[error("could not write '{path}': {reason}")]
    Write { path: String, reason: String },
}

/// Record-scoped dispatch failure, except `Session` which ends all remaining sends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("mail session unavailable: {reason}")]
    Session { reason: String },

    #[error("invalid recipient address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("record has no email address")]
    MissingAddress,

    #[error("record is not eligible for sending: {reason}")]
    Ineligible { reason: String },

    #[error("message could not be built: {reason}")]
    Message { reason: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("send timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl DispatchError {
    pub fn is_session_wide(&self) -> bool {
        matches!(self, DispatchError::Session { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_map_to_exit_severity() {
        let roster = CertError::MalformedRoster {
            message: "missing Email".to_string(),
        };
        assert_eq!(roster.category(), ErrorCategory::Input);
        assert_eq!(roster.severity(), ErrorSeverity::High);

        let io = CertError::IoError(std::io::Error::other("disk"));
        assert_eq!(io.severity(), ErrorSeverity::Critical);
        assert!(!io.recovery_suggestion().is_empty());
    }

    #[test]
    fn test_render_failure_is_a_failing_exit() {
        let err: CertError = RenderError::NameOverflow {
            name: "Alexandra Constantinopoulos".to_string(),
            min_size: 40.0,
            width: 812.0,
            box_width: 600,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Rendering);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("min_font_size"));
    }

    #[test]
    fn test_only_session_dispatch_errors_are_session_wide() {
        assert!(DispatchError::Session {
            reason: "535 bad credentials".to_string()
        }
        .is_session_wide());
        assert!(!DispatchError::Timeout { seconds: 30 }.is_session_wide());
        assert!(!DispatchError::InvalidAddress {
            address: "nope".to_string(),
            reason: "missing @".to_string()
        }
        .is_session_wide());
    }
}
