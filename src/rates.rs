use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    error::{RateError, SeriesError},
    ISO_DATE_FMT,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateObservation {
    pub date: Date,
    pub value: f64,
}

/// Observation as published by the rate source: `{"date": "YYYY-MM-DD", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRate {
    pub date: String,
    pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawRate {
    pub fn parse(&self) -> Result<RateObservation, SeriesError> {
        let date =
            Date::parse(self.date.trim(), ISO_DATE_FMT).map_err(|_| SeriesError::InvalidDate {
                value: self.date.clone(),
            })?;
        let value = match &self.value {
            RawValue::Number(v) => *v,
            RawValue::Text(s) => s.trim().parse().map_err(|_| SeriesError::InvalidValue {
                date: self.date.clone(),
                value: s.clone(),
            })?,
        };
        Ok(RateObservation { date, value })
    }
}

impl From<&RateObservation> for RawRate {
    fn from(o: &RateObservation) -> Self {
        Self {
            date: o.date.to_string(),
            value: RawValue::Number(o.value),
        }
    }
}

/// Rate observations sorted strictly ascending by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSeries {
    observations: Vec<RateObservation>,
}

/// Rate for a target date and the observations it was derived from.
/// `low_date == high_date` for an exact match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub rate: f64,
    pub low_date: Date,
    pub high_date: Date,
}

impl ResolvedRate {
    pub fn is_exact(&self) -> bool {
        self.low_date == self.high_date
    }
}

impl RateSeries {
    pub fn new(mut observations: Vec<RateObservation>) -> Result<Self, SeriesError> {
        observations.sort_by_key(|o| o.date);
        if let Some(o) = observations
            .iter()
            .find(|o| !o.value.is_finite() || o.value <= 0.)
        {
            return Err(SeriesError::NonPositiveRate {
                date: o.date,
                value: o.value,
            });
        }
        if let Some(w) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(w[0].date));
        }
        Ok(Self { observations })
    }

    pub fn from_raw(raw: &[RawRate]) -> Result<Self, SeriesError> {
        let observations = raw
            .iter()
            .map(RawRate::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(observations)
    }

    pub fn to_raw(&self) -> Vec<RawRate> {
        self.observations.iter().map(RawRate::from).collect()
    }

    pub fn observations(&self) -> &[RateObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first(&self) -> Option<&RateObservation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&RateObservation> {
        self.observations.last()
    }

    /// Exact observation for `target` if there is one, otherwise the mean of
    /// the nearest observations on either side of it.
    pub fn resolve(&self, target: Date) -> Result<ResolvedRate, RateError> {
        let obs = &self.observations;
        let (Some(first), Some(last)) = (obs.first(), obs.last()) else {
            return Err(RateError::EmptySeries);
        };
        match obs.binary_search_by_key(&target, |o| o.date) {
            Ok(i) => Ok(ResolvedRate {
                rate: obs[i].value,
                low_date: target,
                high_date: target,
            }),
            Err(0) => Err(RateError::BeforeFirst {
                target,
                first: first.date,
            }),
            Err(i) if i == obs.len() => Err(RateError::AfterLast {
                target,
                last: last.date,
            }),
            Err(i) => {
                let (prev, next) = (&obs[i - 1], &obs[i]);
                Ok(ResolvedRate {
                    rate: (prev.value + next.value) / 2.,
                    low_date: prev.date,
                    high_date: next.date,
                })
            }
        }
    }
}

pub fn resolve(series: &RateSeries, target: Date) -> Result<ResolvedRate, RateError> {
    series.resolve(target)
}
