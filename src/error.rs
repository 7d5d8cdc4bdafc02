use std::{fmt, path::PathBuf};

use thiserror::Error;
use time::Date;

/// Identifies one transaction detail of the export so that excluded or flagged
/// disposals can be traced back to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotRef {
    /// Position of the detail among all sale details of the export.
    pub index: usize,
    /// Sale date as written in the export.
    pub date: String,
    /// Detail type as written in the export.
    pub kind: String,
}

impl fmt::Display for LotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lot #{} sold {} ({})", self.index, self.date, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sell,
    Buy,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Sell => f.write_str("sell"),
            Side::Buy => f.write_str("buy"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("duplicate rate observation for {0}")]
    DuplicateDate(Date),
    #[error("rate observed on {date} must be positive, got {value}")]
    NonPositiveRate { date: Date, value: f64 },
    #[error("invalid rate observation date '{value}'")]
    InvalidDate { value: String },
    #[error("invalid rate value '{value}' observed on {date}")]
    InvalidValue { date: String, value: String },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateError {
    #[error("rate series is empty")]
    EmptySeries,
    #[error("{target} precedes the first rate observation ({first})")]
    BeforeFirst { target: Date, first: Date },
    #[error("{target} follows the last rate observation ({last})")]
    AfterLast { target: Date, last: Date },
}

/// Failure that excludes a single lot from the report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LotError {
    #[error("{lot}: missing field '{field}'")]
    MissingField { lot: LotRef, field: &'static str },
    #[error("{lot}: field '{field}' has invalid value '{value}'")]
    InvalidField {
        lot: LotRef,
        field: &'static str,
        value: String,
    },
    #[error("{lot}: unknown lot type")]
    UnknownLotType { lot: LotRef },
    #[error("{lot}: no {side} rate: {source}")]
    UnresolvableRate {
        lot: LotRef,
        side: Side,
        source: RateError,
    },
}

impl LotError {
    pub fn lot(&self) -> &LotRef {
        match self {
            LotError::MissingField { lot, .. }
            | LotError::InvalidField { lot, .. }
            | LotError::UnknownLotType { lot }
            | LotError::UnresolvableRate { lot, .. } => lot,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("sold on {sell_date} before it was acquired on {buy_date}")]
    SoldBeforeAcquired { sell_date: Date, buy_date: Date },
    #[error("non-positive {field}: {value}")]
    NonPositive { field: &'static str, value: f64 },
}

/// Data-quality issue on a lot that is still part of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct LotWarning {
    pub lot: LotRef,
    pub violation: InvariantViolation,
}

impl fmt::Display for LotWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.lot, self.violation)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate source unavailable at {url}")]
    Unavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode rate observations")]
    Decode(#[from] serde_json::Error),
    #[error("rate cache {path:?} could not be accessed")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error("failed to format request date")]
    Format(#[from] time::error::Format),
}
