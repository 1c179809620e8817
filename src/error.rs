use thiserror::Error;

/// Main error type for procgraph
#[derive(Error, Debug)]
pub enum ProcgraphError {
    /// Connectivity, execution or record decoding failure in the graph database
    #[error("Database error: {0}")]
    Database(String),

    /// A query that expects exactly one record returned none
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Identifier not integer-convertible, or a required parameter is missing
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system / socket I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<neo4rs::Error> for ProcgraphError {
    fn from(err: neo4rs::Error) -> Self {
        ProcgraphError::Database(err.to_string())
    }
}

impl From<neo4rs::DeError> for ProcgraphError {
    fn from(err: neo4rs::DeError) -> Self {
        ProcgraphError::Database(format!("failed to decode record: {}", err))
    }
}

/// Convenient Result type using ProcgraphError
pub type Result<T> = std::result::Result<T, ProcgraphError>;
