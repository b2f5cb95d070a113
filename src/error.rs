use ethers::providers::ProviderError;
use std::io;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid mnemonics, {0} not valid")]
    InvalidMnemonic(String),
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("contract error: {0}")]
    Contract(String),
    #[error("io error: {0}")]
    Io(String),
}

impl AppError {
    /// Message shown to the person at the console. Validation errors already
    /// carry user-facing wording; everything else keeps its category prefix.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Rpc(err.to_string())
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}
