use thiserror::Error;

/// everything that can go wrong between a keypress and the last fragment.
///
/// `EmptyInput` and `Busy` are rejections: nothing changed, nothing is shown.
/// the rest surface as the fixed failure text in the response area.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("nothing to send: prompt is empty and no file is attached")]
    EmptyInput,

    #[error("a request is already in flight")]
    Busy,

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// rejections leave the controller untouched and are not rendered.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ChatError::EmptyInput | ChatError::Busy)
    }
}

impl From<llm::error::LLMError> for ChatError {
    fn from(err: llm::error::LLMError) -> Self {
        ChatError::Provider(err.to_string())
    }
}
