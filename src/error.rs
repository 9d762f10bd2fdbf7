use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("No valid file could be processed. Failed files: {}", failed.join(", "))]
    NoFilesProcessed { failed: Vec<String> },

    #[error("Amount out of range for account {0}")]
    AmountOutOfRange(String),

    #[error("Unknown batch: {0}")]
    UnknownBatch(String),

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
