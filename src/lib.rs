use anyhow::{Context, Error};
use log::{info, warn};
use time::{format_description::BorrowedFormatItem, macros::format_description};

pub mod config;
pub mod error;
pub mod gains;
pub mod lots;
pub mod provider;
pub mod rates;
pub mod report;
pub mod schwab;

use config::ErrorPolicy;
use gains::{compute_lot, compute_totals};
use lots::{date_range, enrich, extract_lots, TransactionRecord};
use provider::{pad_range, RateProvider};
use report::TaxReport;

pub type Result<T> = std::result::Result<T, Error>;

pub const SOURCE_CURRENCY: &str = "USD";
pub const LOCAL_CURRENCY: &str = "SEK";

pub(crate) static EXPORT_DATE_FMT: &[BorrowedFormatItem] = format_description!("[month]/[day]/[year]");
pub(crate) static ISO_DATE_FMT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Runs the whole computation: sale lots are extracted from `records`, priced
/// with rates from `provider` and turned into per-lot and total gains.
pub fn compute_report<P>(records: &[TransactionRecord], provider: &P, policy: ErrorPolicy) -> Result<TaxReport>
where
    P: RateProvider + ?Sized,
{
    let extraction = extract_lots(records);
    let mut excluded = policy
        .apply(extraction.errors)
        .context("malformed sale record")?;
    let mut lots = extraction.lots;

    let Some((oldest, newest)) = date_range(&lots) else {
        info!("no sales found");
        return Ok(TaxReport {
            excluded,
            ..TaxReport::default()
        });
    };
    let (from, to) = pad_range(oldest, newest)?;
    info!("sales span {oldest}..{newest}, loading rates for {from}..{to}");
    let series = provider
        .load(from, to)
        .context("failed to load exchange rates")?;

    let unresolved = enrich(&mut lots, &series);
    excluded.extend(policy.apply(unresolved).context("exchange rate unavailable")?);
    let results: Vec<_> = lots.iter().filter_map(compute_lot).collect();
    let totals = compute_totals(&results);
    // An excluded lot is reported once, as excluded.
    let warnings: Vec<_> = extraction
        .warnings
        .into_iter()
        .filter(|w| !excluded.iter().any(|e| e.lot() == &w.lot))
        .collect();
    for w in &warnings {
        warn!("{w}");
    }

    Ok(TaxReport {
        results,
        totals,
        excluded,
        warnings,
    })
}
