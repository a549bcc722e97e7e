use thiserror::Error;

/// Errors raised by the table model and the numeric engines.
///
/// Numeric domain problems (zero amplitude, zero redshift, negative
/// variance) are not errors: they propagate as NaN/Inf through the results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Salt2Error {
    #[error("field '{field}' has {found} rows, expected {expected}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("field '{0}' is not numeric")]
    NotNumeric(String),
}

pub type Result<T> = std::result::Result<T, Salt2Error>;
