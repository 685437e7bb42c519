use thiserror::Error;

/// Input rejected before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{field} is too long ({len} chars, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
