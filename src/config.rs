use std::path::PathBuf;

use clap::ValueEnum;
use log::warn;

use crate::error::LotError;

/// What to do with a lot that cannot be extracted or priced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Fail the whole run on the first lot error.
    #[default]
    Abort,
    /// Leave the lot out of the totals and list it in the report.
    Skip,
}

impl ErrorPolicy {
    /// Returns the errors to report as excluded lots, or the first one as a
    /// run failure under [`ErrorPolicy::Abort`].
    pub fn apply(self, errors: Vec<LotError>) -> Result<Vec<LotError>, LotError> {
        match self {
            ErrorPolicy::Abort => match errors.into_iter().next() {
                Some(first) => Err(first),
                None => Ok(Vec::new()),
            },
            ErrorPolicy::Skip => {
                for e in &errors {
                    warn!("skipping {e}");
                }
                Ok(errors)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    /// 0 prints totals per sale date, 1 and above adds each lot with its rates.
    pub verbosity: u8,
    pub error_policy: ErrorPolicy,
    pub detail_csv: Option<PathBuf>,
}

impl ReportConfig {
    pub fn show_lots(&self) -> bool {
        self.verbosity > 0
    }
}

#[derive(Debug, Clone)]
pub struct RateSourceConfig {
    pub base_url: String,
    pub series: String,
    /// `None` disables the file cache.
    pub cache_path: Option<PathBuf>,
    pub refresh: bool,
}
