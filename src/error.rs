use thiserror::Error;

/// Main error type for the signal service
#[derive(Error, Debug)]
pub enum BetSignalError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Prediction errors
    #[error(transparent)]
    Predictor(#[from] PredictorError),

    // Notification errors
    #[error(transparent)]
    ChannelDispatch(#[from] ChannelDispatchError),

    // Scheduling errors
    #[error("Worker cycle failed: {worker} - {reason}")]
    WorkerCycle { worker: String, reason: String },

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    // Data errors
    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Store error: {0}")]
    Store(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for BetSignalError
pub type Result<T> = std::result::Result<T, BetSignalError>;

/// Errors raised by a predictor. The decision combiner treats
/// `InvalidFeature` and `NotTrained` as "skip this predictor".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    #[error("Invalid features for {predictor}: {reason}")]
    InvalidFeature { predictor: String, reason: String },

    #[error("Predictor not trained: {0}")]
    NotTrained(String),

    #[error("Empty training dataset for {0}")]
    EmptyDataset(String),

    #[error("Training set mismatch for {predictor}: {features} feature rows, {labels} labels")]
    LabelMismatch {
        predictor: String,
        features: usize,
        labels: usize,
    },

    #[error("Invalid label for {predictor}: {label}")]
    InvalidLabel { predictor: String, label: String },
}

impl PredictorError {
    /// True for errors that only narrow the analysis of one match
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            PredictorError::InvalidFeature { .. } | PredictorError::NotTrained(_)
        )
    }
}

/// Errors from a notification channel send/edit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelDispatchError {
    #[error("Channel {channel} rejected message: {reason}")]
    Rejected { channel: String, reason: String },

    #[error("Channel {channel} transport failure: {reason}")]
    Transport { channel: String, reason: String },
}
