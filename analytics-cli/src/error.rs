use analytics_client::{ClientError, JobError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("analysis run: {0}")]
    Job(#[from] JobError<ClientError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Could not write config file: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "interactive")]
    #[error("Prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[cfg(not(feature = "interactive"))]
    #[error("No {0} given; pass it as a flag, set it in the environment or the config file")]
    MissingCredential(&'static str),

    #[error("Analysis run {id} failed: {message}")]
    RunFailed { id: String, message: String },
}
