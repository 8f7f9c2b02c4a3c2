use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}

/// Failures of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSerialize(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDeserialize(#[from] bson::de::Error),
}

/// Failures of the file storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown file reference '{0}'")]
    UnknownReference(String),
    #[error("file '{name}' is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by classroom operations.
#[derive(Debug, Error)]
pub enum ClassError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("the due date for this assignment has passed")]
    DueDatePassed,
    #[error("a teacher can't join their own classroom")]
    SelfJoin,
    #[error("already a member of this classroom")]
    AlreadyMember,
    #[error("email '{0}' belongs to another user")]
    EmailTaken(String),
    #[error("unable to generate a unique classroom code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClassError {
    pub fn validation(detail: impl ToString) -> ClassError {
        ClassError::Validation(detail.to_string())
    }

    pub fn not_found(what: impl ToString) -> ClassError {
        ClassError::NotFound(what.to_string())
    }

    pub fn forbidden(reason: impl ToString) -> ClassError {
        ClassError::Forbidden(reason.to_string())
    }
}

pub type ClassResult<T> = Result<T, ClassError>;
