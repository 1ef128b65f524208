use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Table '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Column '{column}' of table '{table}', row {row}: '{value}' is not a non-negative integer")]
    TypeConversion {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("No common key column to join on (fact table has: {})", fact_columns.join(", "))]
    SchemaMismatch { fact_columns: Vec<String> },

    #[error("Invalid selector value: {0}")]
    InvalidSelector(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, SurveyError>;

#[cfg(feature = "python")]
impl From<SurveyError> for pyo3::PyErr {
    fn from(err: SurveyError) -> pyo3::PyErr {
        match err {
            SurveyError::InvalidSelector(_) => {
                pyo3::exceptions::PyValueError::new_err(err.to_string())
            }
            other => pyo3::exceptions::PyRuntimeError::new_err(other.to_string()),
        }
    }
}
