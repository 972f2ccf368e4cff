use crate::driver::ErrorCode;
use crate::Api;
use thiserror::Error;

/// Terminal outcome of a failed negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("graphics driver unavailable: {stage} failed{}", with_code(.code))]
    DriverUnavailable {
        stage: &'static str,
        code: Option<ErrorCode>,
    },

    #[error(
        "no compatible configuration found after exhausting {relaxable} relaxable attributes \
         ({iterations} attempts)"
    )]
    ExhaustedRelaxationOptions {
        relaxable: usize,
        iterations: usize,
        code: Option<ErrorCode>,
    },

    #[error("explicitly requested configuration {id} is unavailable")]
    ExplicitConfigUnavailable { id: i32, code: Option<ErrorCode> },

    #[error("requested {requested} but the driver supports at most {supported}")]
    RequestedApiUnsupported { requested: Api, supported: Api },

    #[error("no configuration exactly matches R{red}G{green}B{blue}A{alpha}")]
    ExactColorUnavailable {
        red: u32,
        green: u32,
        blue: u32,
        alpha: u32,
        code: Option<ErrorCode>,
    },
}

impl NegotiationError {
    /// Last driver error observed before giving up, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            NegotiationError::DriverUnavailable { code, .. }
            | NegotiationError::ExhaustedRelaxationOptions { code, .. }
            | NegotiationError::ExplicitConfigUnavailable { code, .. }
            | NegotiationError::ExactColorUnavailable { code, .. } => *code,
            NegotiationError::RequestedApiUnsupported { .. } => None,
        }
    }
}

fn with_code(code: &Option<ErrorCode>) -> String {
    code.map(|code| format!(" with {code}")).unwrap_or_default()
}

/// Recoverable outcome of one negotiation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("no configuration matches the candidate")]
    NoMatchingConfiguration,

    #[error("no enumerated configuration has the exact colour format")]
    NoExactColorMatch,

    #[error("context creation failed with {0}")]
    ContextCreationFailed(ErrorCode),
}

impl AttemptFailure {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AttemptFailure::ContextCreationFailed(code) => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeWindowError {
    #[error("could not open native display: {0}")]
    Display(String),

    #[error("could not create {width}x{height} native window: {reason}")]
    Window { width: u32, height: u32, reason: String },
}

/// Failure while binding a negotiated context to a window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    NativeWindow(#[from] NativeWindowError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("window surface creation failed with {0}")]
    SurfaceCreationFailed(ErrorCode),

    #[error("make current failed with {0}")]
    MakeCurrentFailed(ErrorCode),

    #[error("swap buffers failed with {0}")]
    SwapFailed(ErrorCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_reason_names_slot_count() {
        let err = NegotiationError::ExhaustedRelaxationOptions {
            relaxable: 5,
            iterations: 9,
            code: Some(ErrorCode::BAD_MATCH),
        };
        assert!(err.to_string().contains("exhausting 5 relaxable attributes"));
        assert_eq!(err.code(), Some(ErrorCode::BAD_MATCH));
    }

    #[test]
    fn driver_unavailable_names_code_only_when_raised() {
        let err = NegotiationError::DriverUnavailable {
            stage: "initialize",
            code: Some(ErrorCode::NOT_INITIALIZED),
        };
        assert_eq!(
            err.to_string(),
            "graphics driver unavailable: initialize failed with NOT_INITIALIZED (0x3001)"
        );

        let err = NegotiationError::DriverUnavailable {
            stage: "capability probe",
            code: None,
        };
        assert_eq!(err.to_string(), "graphics driver unavailable: capability probe failed");
        assert_eq!(err.code(), None);
    }
}
