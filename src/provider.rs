use std::{fs, io, path::PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::{error::ComponentRange, Date, Month};

use crate::{
    error::{ProviderError, SeriesError},
    rates::{RateSeries, RawRate},
    ISO_DATE_FMT,
};

pub const RIKSBANK_API_URL: &str = "https://api.riksbank.se/swea/v1";
pub const SEK_USD_SERIES: &str = "sekusdpmi";

/// Source of exchange rates covering a date span.
pub trait RateProvider {
    fn load(&self, from: Date, to: Date) -> Result<RateSeries, ProviderError>;
}

/// An already materialised series serves any request as is.
impl RateProvider for RateSeries {
    fn load(&self, _from: Date, _to: Date) -> Result<RateSeries, ProviderError> {
        Ok(self.clone())
    }
}

impl<P: RateProvider + ?Sized> RateProvider for &P {
    fn load(&self, from: Date, to: Date) -> Result<RateSeries, ProviderError> {
        (**self).load(from, to)
    }
}

/// Widens `[oldest, newest]` by one calendar month on each side so that dates
/// at the edges still have an observation on both sides.
pub fn pad_range(oldest: Date, newest: Date) -> Result<(Date, Date), ComponentRange> {
    Ok((shift_months(oldest, -1)?, shift_months(newest, 1)?))
}

fn shift_months(date: Date, months: i32) -> Result<Date, ComponentRange> {
    let total = date.year() * 12 + i32::from(u8::from(date.month())) - 1 + months;
    let year = total.div_euclid(12);
    let month = Month::try_from((total.rem_euclid(12) + 1) as u8)?;
    let day = date.day().min(month.length(year));
    Date::from_calendar_date(year, month, day)
}

/// Riksbank SWEA observations endpoint.
#[derive(Debug, Clone)]
pub struct RiksbankClient {
    base_url: String,
    series: String,
    client: reqwest::blocking::Client,
}

impl RiksbankClient {
    pub fn new(base_url: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            series: series.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn url(&self, from: Date, to: Date) -> Result<String, ProviderError> {
        Ok(format!(
            "{}/Observations/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.series,
            from.format(ISO_DATE_FMT)?,
            to.format(ISO_DATE_FMT)?
        ))
    }
}

impl RateProvider for RiksbankClient {
    fn load(&self, from: Date, to: Date) -> Result<RateSeries, ProviderError> {
        let url = self.url(from, to)?;
        info!("fetching exchange rates from {url}");
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|source| ProviderError::Unavailable {
                url: url.clone(),
                source,
            })?;
        let raw: Vec<RawRate> = serde_json::from_str(&body)?;
        let series = RateSeries::from_raw(&raw)?;
        info!("received {} observations", series.len());
        Ok(series)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    from: String,
    to: String,
    observations: Vec<RawRate>,
}

/// Keeps the last fetched series in a JSON file and reuses it while it was
/// fetched for a span containing the requested one.
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    path: PathBuf,
    refresh: bool,
}

impl<P: RateProvider> CachedProvider<P> {
    pub fn new(inner: P, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            refresh: false,
        }
    }

    /// Ignore any existing cache and always query the inner provider.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    fn cache_error(&self, source: io::Error) -> ProviderError {
        ProviderError::Cache {
            path: self.path.clone(),
            source,
        }
    }

    fn read_cache(&self) -> Result<Option<(Date, Date, RateSeries)>, ProviderError> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.cache_error(e)),
        };
        let cache: CacheFile = serde_json::from_str(&body)?;
        let parse = |value: &str| {
            Date::parse(value, ISO_DATE_FMT).map_err(|_| SeriesError::InvalidDate {
                value: value.to_string(),
            })
        };
        let series = RateSeries::from_raw(&cache.observations)?;
        Ok(Some((parse(&cache.from)?, parse(&cache.to)?, series)))
    }

    fn write_cache(&self, from: Date, to: Date, series: &RateSeries) -> Result<(), ProviderError> {
        let cache = CacheFile {
            from: from.format(ISO_DATE_FMT)?,
            to: to.format(ISO_DATE_FMT)?,
            observations: series.to_raw(),
        };
        let body = serde_json::to_string_pretty(&cache)?;
        fs::write(&self.path, body).map_err(|e| self.cache_error(e))
    }
}

impl<P: RateProvider> RateProvider for CachedProvider<P> {
    fn load(&self, from: Date, to: Date) -> Result<RateSeries, ProviderError> {
        if !self.refresh {
            match self.read_cache() {
                Ok(Some((cached_from, cached_to, series))) if cached_from <= from && cached_to >= to => {
                    info!("using cached rates from {}", self.path.display());
                    return Ok(series);
                }
                Ok(Some((cached_from, cached_to, _))) => info!(
                    "cached rates cover {cached_from}..{cached_to}, need {from}..{to}"
                ),
                Ok(None) => {}
                Err(e) => warn!("ignoring unreadable rate cache {}: {e}", self.path.display()),
            }
        }
        let series = self.inner.load(from, to)?;
        if let Err(e) = self.write_cache(from, to, &series) {
            warn!("rates not cached: {e}");
        }
        Ok(series)
    }
}
