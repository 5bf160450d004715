use clock::ClockError;
use thiserror::Error;
use tn::TnError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Tn(#[from] TnError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("column \"{0}\" already exists")]
    DuplicateColumn(String),

    #[error("no column named \"{0}\"")]
    MissingColumn(String),

    #[error("row {row} out of range for a table of {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("column \"{name}\" has {got} values but the table has {rows} rows")]
    LengthMismatch { name: String, got: usize, rows: usize },
}

pub type SimResult<T> = Result<T, SimError>;
