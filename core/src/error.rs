use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source table '{name}' not found")]
    MissingTable { name: String },

    #[error("Source table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Invalid feature config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type FeatureResult<T> = Result<T, FeatureError>;
