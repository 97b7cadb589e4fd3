use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlarmLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No CSV or Parquet table in archive '{0}'")]
    NoTableFound(String),

    #[error("Unsupported file format '{0}': provide a .csv, .parquet or .zip file")]
    UnsupportedFormat(String),

    #[error("Missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Insufficient data: {0}")]
    DataInsufficiency(String),

    #[error("Machine {requested} not found in data. Available: {}", available.join(", "))]
    MachineNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Numeric error: {0}")]
    Numeric(String),
}

impl AlarmLogError {
    /// Coarse reason code carried by failed pipeline outcomes.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Io(_)
            | Self::Csv(_)
            | Self::Parquet(_)
            | Self::Zip(_)
            | Self::NoTableFound(_)
            | Self::UnsupportedFormat(_) => FailureReason::Load,
            Self::Schema { .. } => FailureReason::Schema,
            Self::DataInsufficiency(_) => FailureReason::DataInsufficiency,
            Self::MachineNotFound { .. } => FailureReason::MachineNotFound,
            Self::Configuration(_) => FailureReason::Configuration,
            Self::Render(_) | Self::Numeric(_) => FailureReason::Internal,
        }
    }

    /// Human-readable message suitable for direct display as a run summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Io(_)
            | Self::Csv(_)
            | Self::Parquet(_)
            | Self::Zip(_)
            | Self::NoTableFound(_)
            | Self::UnsupportedFormat(_) => format!("Error loading dataset: {self}"),
            Self::Schema { .. } => format!("Error: {self}"),
            _ => self.to_string(),
        }
    }
}

impl From<parquet::errors::ParquetError> for AlarmLogError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Self::Parquet(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for AlarmLogError {
    fn from(e: arrow::error::ArrowError) -> Self {
        Self::Parquet(e.to_string())
    }
}

/// Failure categories exposed across the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Load,
    Schema,
    DataInsufficiency,
    MachineNotFound,
    Configuration,
    Internal,
}

pub type Result<T> = std::result::Result<T, AlarmLogError>;
