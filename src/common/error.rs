use rust_tokenizers::error::TokenizerError;
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MlmExportError {
    #[error("Endpoint not available error: {0}")]
    FileDownloadError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Conversion failed: {primary}; fallback also failed: {fallback}")]
    ConversionFailed {
        primary: Box<MlmExportError>,
        fallback: Box<MlmExportError>,
    },
}

#[cfg(feature = "remote")]
impl From<cached_path::Error> for MlmExportError {
    fn from(error: cached_path::Error) -> Self {
        MlmExportError::FileDownloadError(error.to_string())
    }
}

impl From<std::io::Error> for MlmExportError {
    fn from(error: std::io::Error) -> Self {
        MlmExportError::IOError(error.to_string())
    }
}

impl From<TokenizerError> for MlmExportError {
    fn from(error: TokenizerError) -> Self {
        MlmExportError::TokenizerError(error.to_string())
    }
}

impl From<TchError> for MlmExportError {
    fn from(error: TchError) -> Self {
        MlmExportError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for MlmExportError {
    fn from(error: serde_json::Error) -> Self {
        MlmExportError::SerializationError(error.to_string())
    }
}
