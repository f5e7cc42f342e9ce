use std::process::ExitStatus;

pub type CadenzaResult<T> = Result<T, CadenzaError>;

#[derive(thiserror::Error, Debug)]
pub enum CadenzaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("callback not found: {0}")]
    CallbackNotFound(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encoder `{program}` exited with {status}: {stderr}")]
    Encoder {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenzaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn callback_not_found(msg: impl Into<String>) -> Self {
        Self::CallbackNotFound(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// `true` for failures reported by the external encoder process itself.
    pub fn is_encoder_failure(&self) -> bool {
        matches!(self, Self::Encoder { .. })
    }
}
