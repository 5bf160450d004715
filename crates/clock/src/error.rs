use thiserror::Error;
use tn::TnError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClockError {
    #[error("operator \"{0}\" not recognized")]
    UnrecognizedOperator(String),

    #[error("state \"{0}\" not recognized")]
    UnrecognizedState(String),

    /// Intervals are 1-indexed and need `1 <= begin < end <= len`.
    #[error("invalid interval [{begin}, {end}] on a chain of {len} sites")]
    InvalidInterval { begin: usize, end: usize, len: usize },

    /// Any order needs `N >= 2`; conserved charges are limited to `N <= 6`.
    #[error("clock order {0} not supported here")]
    UnsupportedOrder(usize),

    #[error("a clock chain needs at least 2 sites, got {0}")]
    InvalidLength(usize),

    #[error("the longitudinal field breaks the conserved Z_N charge")]
    ChargeNotConserved,

    #[error("sector {sector} out of range for Z_{order}")]
    InvalidSector { sector: usize, order: usize },

    #[error(transparent)]
    Tn(#[from] TnError),
}

pub type ClockResult<T> = Result<T, ClockError>;
