//! Error types for orderbot

use thiserror::Error;

/// Result type for orderbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for orderbot
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to launch Chrome
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Chrome not found
    #[error("Chrome not found (set CHROME_PATH or browser.chrome_path)")]
    ChromeNotFound,

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// CDP error without method context
    #[error("CDP error: {0}")]
    CdpSimple(String),

    /// Navigation error
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Element not (yet) present in the document
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A step's element never appeared within its poll budget
    #[error("Step '{step}' timed out after {attempts} attempts waiting for {target}")]
    StepTimeout {
        step: String,
        target: String,
        attempts: u32,
    },

    /// The page is present but in a state the flow cannot proceed from
    #[error("Unexpected page state at '{step}': {detail}")]
    UnexpectedPageState { step: String, detail: String },

    /// The page framework did not accept a synthetic value change
    #[error("Field '{field}' rejected value: expected {expected:?}, read back {actual:?}")]
    ActionRejected {
        field: String,
        expected: String,
        actual: String,
    },

    /// Page load timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// YAML parse error
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decode error (e.g., base64)
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Create an unexpected page state error
    pub fn page_state(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedPageState {
            step: step.into(),
            detail: detail.into(),
        }
    }

    /// Transient errors are retried by pollers; everything else ends the run.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ElementNotFound(_) => true,
            // Execution context torn down mid-navigation
            Error::Cdp { message, .. } => {
                message.contains("context") || message.contains("No node with given id")
            }
            _ => false,
        }
    }

    /// Short machine-readable kind, used in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Launch(_) | Error::ChromeNotFound => "launch",
            Error::Transport { .. } | Error::Cdp { .. } | Error::CdpSimple(_) => "browser",
            Error::Navigation(_) | Error::Timeout(_) => "navigation",
            Error::ElementNotFound(_) => "element_not_found",
            Error::StepTimeout { .. } => "step_timeout",
            Error::UnexpectedPageState { .. } => "unexpected_page_state",
            Error::ActionRejected { .. } => "action_rejected",
            Error::Config(_) | Error::Yaml(_) => "config",
            Error::Serialization(_) | Error::Decode(_) | Error::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_elements_are_transient() {
        assert!(Error::ElementNotFound("#x".into()).is_transient());
        assert!(Error::cdp("Runtime.evaluate", -32000, "Cannot find context with specified id")
            .is_transient());
        assert!(!Error::StepTimeout {
            step: "proceed".into(),
            target: "[name=\"proceed\"]".into(),
            attempts: 3,
        }
        .is_transient());
        assert!(!Error::page_state("shipping-continue", "blocked").is_transient());
    }

    #[test]
    fn test_error_messages_name_the_step() {
        let err = Error::StepTimeout {
            step: "guest-login".into(),
            target: "#signIn.guestLogin.guestLogin".into(),
            attempts: 40,
        };
        let msg = err.to_string();
        assert!(msg.contains("guest-login"));
        assert!(msg.contains("40 attempts"));
        assert_eq!(err.kind(), "step_timeout");
    }
}
