use thiserror::Error;

#[derive(Error, Debug)]
pub enum FiscalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "workbook")]
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("No header row found in {0}")]
    NoHeader(String),

    #[error("Missing {column} column in {file}")]
    MissingColumn { file: String, column: &'static str },

    #[error("Unknown extractor kind: {0}")]
    UnknownKind(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FiscalError>;
