use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TnError {
    /// Returned when a chain of zero sites is requested.
    #[error("cannot build a network for an empty system")]
    EmptySystem,

    #[error("site {site} out of range for a chain of {len} sites")]
    SiteOutOfRange { site: usize, len: usize },

    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Raised by a [`SiteSet`][crate::opsum::SiteSet] that does not know an
    /// operator name.
    #[error("operator \"{name}\" not recognized on site {site}")]
    UnknownOperator { name: String, site: usize },

    #[error("charge layout mismatch: {0}")]
    Charges(String),

    /// The eigensolver or a factorization produced non-finite numbers.
    #[error("numerical breakdown: {0}")]
    Numerical(String),
}

pub type TnResult<T> = Result<T, TnError>;
