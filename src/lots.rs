use std::{fmt, str::FromStr};

use log::debug;
use serde::{Deserialize, Deserializer};
use time::Date;

use crate::{
    error::{InvariantViolation, LotError, LotRef, LotWarning, Side},
    rates::{RateSeries, ResolvedRate},
    EXPORT_DATE_FMT,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransactionRecord {
    pub action: String,
    pub date: String,
    pub symbol: Option<String>,
    pub transaction_details: Vec<TransactionDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransactionDetail {
    pub details: DetailFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailFields {
    #[serde(rename = "Type")]
    pub lot_type: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub shares: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub sale_price: Option<String>,
    pub purchase_date: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub purchase_price: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub purchase_fair_market_value: Option<String>,
    pub vest_date: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub vest_fair_market_value: Option<String>,
}

/// Amounts are normally quoted strings (`"$12.30"`), but bare numbers are accepted too.
fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Number(f64),
    }
    Ok(Option::<Field>::deserialize(deserializer)?.map(|f| match f {
        Field::Text(s) => s,
        Field::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleAction {
    Sale,
    QuickSale,
}

impl SaleAction {
    pub fn from_action(action: &str) -> Option<Self> {
        match action.trim() {
            "Sale" => Some(SaleAction::Sale),
            "Quick Sale" => Some(SaleAction::QuickSale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LotType {
    RegularSale,
    DividendReinvestment,
    RestrictedStockVest,
    Espp,
}

impl FromStr for LotType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Sale" | "Purchase" | "Regular" => Ok(LotType::RegularSale),
            "Div Reinv" | "Dividend Reinvestment" => Ok(LotType::DividendReinvestment),
            "RS" | "Restricted Stock" => Ok(LotType::RestrictedStockVest),
            "ESPP" => Ok(LotType::Espp),
            _ => Err(format!("'{}' is not a valid lot type", s)),
        }
    }
}

impl fmt::Display for LotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LotType::RegularSale => "Sale",
            LotType::DividendReinvestment => "Div Reinv",
            LotType::RestrictedStockVest => "RS",
            LotType::Espp => "ESPP",
        })
    }
}

/// How the sold shares were acquired. Each variant carries exactly the
/// fields its detail type must provide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    Purchase {
        date: Date,
        price: f64,
    },
    DividendReinvestment {
        date: Date,
        price: f64,
    },
    Vest {
        date: Date,
        fair_market_value: f64,
    },
    Espp {
        date: Date,
        fair_market_value: f64,
        price_paid: f64,
    },
}

impl Acquisition {
    pub fn classify(lot: &LotRef, lot_type: LotType, fields: &DetailFields) -> Result<Self, LotError> {
        let purchase_date = || date_field(lot, "PurchaseDate", fields.purchase_date.as_deref());
        let purchase_price = || amount_field(lot, "PurchasePrice", fields.purchase_price.as_deref());
        Ok(match lot_type {
            LotType::RegularSale => Acquisition::Purchase {
                date: purchase_date()?,
                price: purchase_price()?,
            },
            LotType::DividendReinvestment => Acquisition::DividendReinvestment {
                date: purchase_date()?,
                price: purchase_price()?,
            },
            LotType::RestrictedStockVest => Acquisition::Vest {
                date: date_field(lot, "VestDate", fields.vest_date.as_deref())?,
                fair_market_value: amount_field(
                    lot,
                    "VestFairMarketValue",
                    fields.vest_fair_market_value.as_deref(),
                )?,
            },
            LotType::Espp => Acquisition::Espp {
                date: purchase_date()?,
                fair_market_value: amount_field(
                    lot,
                    "PurchaseFairMarketValue",
                    fields.purchase_fair_market_value.as_deref(),
                )?,
                price_paid: purchase_price()?,
            },
        })
    }

    pub fn lot_type(&self) -> LotType {
        match self {
            Acquisition::Purchase { .. } => LotType::RegularSale,
            Acquisition::DividendReinvestment { .. } => LotType::DividendReinvestment,
            Acquisition::Vest { .. } => LotType::RestrictedStockVest,
            Acquisition::Espp { .. } => LotType::Espp,
        }
    }

    pub fn date(&self) -> Date {
        match *self {
            Acquisition::Purchase { date, .. }
            | Acquisition::DividendReinvestment { date, .. }
            | Acquisition::Vest { date, .. }
            | Acquisition::Espp { date, .. } => date,
        }
    }

    /// Per-share cost basis in the source currency.
    pub fn cost_basis(&self) -> f64 {
        match *self {
            Acquisition::Purchase { price, .. } | Acquisition::DividendReinvestment { price, .. } => {
                price
            }
            Acquisition::Vest {
                fair_market_value, ..
            }
            | Acquisition::Espp {
                fair_market_value, ..
            } => fair_market_value,
        }
    }

    pub fn espp_discount_price(&self) -> Option<f64> {
        match *self {
            Acquisition::Espp { price_paid, .. } => Some(price_paid),
            _ => None,
        }
    }
}

/// One disposal paired with its acquisition. The rate fields are filled in by [`enrich`].
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub id: LotRef,
    pub action: SaleAction,
    pub symbol: Option<String>,
    pub lot_type: LotType,
    pub quantity: f64,
    pub sell_date: Date,
    pub buy_date: Date,
    pub sell_price: f64,
    pub buy_price: f64,
    pub espp_discount_price: Option<f64>,
    pub sell_rate: Option<ResolvedRate>,
    pub buy_rate: Option<ResolvedRate>,
}

impl Lot {
    fn from_detail(
        index: usize,
        action: SaleAction,
        record: &TransactionRecord,
        fields: &DetailFields,
    ) -> Result<Self, LotError> {
        let id = LotRef {
            index,
            date: record.date.trim().to_string(),
            kind: fields.lot_type.as_deref().unwrap_or_default().trim().to_string(),
        };
        let kind = required(&id, "Type", fields.lot_type.as_deref())?;
        let lot_type: LotType = kind
            .parse()
            .map_err(|_| LotError::UnknownLotType { lot: id.clone() })?;
        let sell_date = date_field(&id, "Date", Some(record.date.as_str()))?;
        let quantity = amount_field(&id, "Shares", fields.shares.as_deref())?;
        let sell_price = amount_field(&id, "SalePrice", fields.sale_price.as_deref())?;
        let acquisition = Acquisition::classify(&id, lot_type, fields)?;
        Ok(Lot {
            id,
            action,
            symbol: record.symbol.clone(),
            lot_type: acquisition.lot_type(),
            quantity,
            sell_date,
            buy_date: acquisition.date(),
            sell_price,
            buy_price: acquisition.cost_basis(),
            espp_discount_price: acquisition.espp_discount_price(),
            sell_rate: None,
            buy_rate: None,
        })
    }

    pub fn check(&self) -> Vec<LotWarning> {
        let mut violations = Vec::new();
        if self.sell_date < self.buy_date {
            violations.push(InvariantViolation::SoldBeforeAcquired {
                sell_date: self.sell_date,
                buy_date: self.buy_date,
            });
        }
        let amounts = [
            ("quantity", Some(self.quantity)),
            ("sell price", Some(self.sell_price)),
            ("buy price", Some(self.buy_price)),
            ("ESPP purchase price", self.espp_discount_price),
        ];
        for (field, value) in amounts {
            if let Some(value) = value.filter(|v| *v <= 0.) {
                violations.push(InvariantViolation::NonPositive { field, value });
            }
        }
        violations
            .into_iter()
            .map(|violation| LotWarning {
                lot: self.id.clone(),
                violation,
            })
            .collect()
    }

    pub fn rates(&self) -> Option<(ResolvedRate, ResolvedRate)> {
        self.sell_rate.zip(self.buy_rate)
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub lots: Vec<Lot>,
    pub errors: Vec<LotError>,
    pub warnings: Vec<LotWarning>,
}

/// Turns every detail of every sale record into a lot, in export order.
pub fn extract_lots(records: &[TransactionRecord]) -> Extraction {
    let mut extraction = Extraction::default();
    let mut index = 0;
    for record in records {
        let Some(action) = SaleAction::from_action(&record.action) else {
            continue;
        };
        for detail in &record.transaction_details {
            index += 1;
            match Lot::from_detail(index, action, record, &detail.details) {
                Ok(lot) => {
                    extraction.warnings.extend(lot.check());
                    extraction.lots.push(lot);
                }
                Err(e) => extraction.errors.push(e),
            }
        }
    }
    extraction
}

/// Oldest acquisition date and newest sale date across `lots`.
pub fn date_range(lots: &[Lot]) -> Option<(Date, Date)> {
    let oldest = lots.iter().map(|l| l.buy_date).min()?;
    let newest = lots.iter().map(|l| l.sell_date).max()?;
    Some((oldest, newest))
}

/// Resolves both rates of every lot. A lot is only updated when both dates
/// resolve; the others are reported back.
pub fn enrich(lots: &mut [Lot], series: &RateSeries) -> Vec<LotError> {
    let mut errors = Vec::new();
    for lot in lots.iter_mut() {
        let resolved = series
            .resolve(lot.sell_date)
            .map_err(|source| (Side::Sell, source))
            .and_then(|sell| {
                series
                    .resolve(lot.buy_date)
                    .map(|buy| (sell, buy))
                    .map_err(|source| (Side::Buy, source))
            });
        match resolved {
            Ok((sell, buy)) => {
                debug!(
                    "{}: sell rate {} [{}..{}], buy rate {} [{}..{}]",
                    lot.id, sell.rate, sell.low_date, sell.high_date, buy.rate, buy.low_date, buy.high_date
                );
                lot.sell_rate = Some(sell);
                lot.buy_rate = Some(buy);
            }
            Err((side, source)) => {
                lot.sell_rate = None;
                lot.buy_rate = None;
                errors.push(LotError::UnresolvableRate {
                    lot: lot.id.clone(),
                    side,
                    source,
                });
            }
        }
    }
    errors
}

fn required<'a>(lot: &LotRef, field: &'static str, value: Option<&'a str>) -> Result<&'a str, LotError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LotError::MissingField {
            lot: lot.clone(),
            field,
        })
}

fn invalid(lot: &LotRef, field: &'static str, value: &str) -> LotError {
    LotError::InvalidField {
        lot: lot.clone(),
        field,
        value: value.to_string(),
    }
}

fn date_field(lot: &LotRef, field: &'static str, value: Option<&str>) -> Result<Date, LotError> {
    let raw = required(lot, field, value)?;
    Date::parse(raw, EXPORT_DATE_FMT).map_err(|_| invalid(lot, field, raw))
}

fn amount_field(lot: &LotRef, field: &'static str, value: Option<&str>) -> Result<f64, LotError> {
    let raw = required(lot, field, value)?;
    parse_money(raw).ok_or_else(|| invalid(lot, field, raw))
}

/// Parses `"$1,234.50"` style amounts.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
