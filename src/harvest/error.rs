use chrono::NaiveDate;
use thiserror::Error;

pub type HarvestResult<T> = Result<T, HarvestError>;

/// Everything that can end a harvest attempt. All variants except
/// `HarvestExhausted` are retried by the supervisor.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("tooltip unavailable: {0}")]
    TooltipUnavailable(String),

    #[error("could not parse date {0:?}")]
    UnparseableDate(String),

    #[error("gap in dates {previous} -> {current}")]
    DateContinuityViolation {
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("shape validation failed: {0}")]
    ShapeValidation(ShapeViolation),

    #[error("table did not converge after {cycles} scroll cycles")]
    NoConvergence { cycles: u32 },

    #[error(transparent)]
    Surface(#[from] anyhow::Error),

    #[error("harvest failed after {attempts} attempts")]
    HarvestExhausted {
        attempts: u32,
        #[source]
        last: Box<HarvestError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    #[error("expected at least {expected} rows, found {found}")]
    TooFewRows { expected: usize, found: usize },

    #[error("row {row:?} has {found} columns, expected at least {expected}")]
    TooFewColumns {
        row: String,
        expected: usize,
        found: usize,
    },
}

impl From<ShapeViolation> for HarvestError {
    fn from(v: ShapeViolation) -> Self {
        HarvestError::ShapeValidation(v)
    }
}
