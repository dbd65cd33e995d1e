use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Record '{tid}' references parent '{parent_tid}' which is not in the snapshot")]
    DanglingReference { tid: String, parent_tid: String },

    #[error("Cycle detected in parent links starting at '{tid}': {}", path.join(" -> "))]
    Cycle { tid: String, path: Vec<String> },

    #[error("Duplicate tid '{0}' in snapshot")]
    DuplicateTid(String),

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid resolver configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
