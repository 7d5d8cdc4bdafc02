use time::Date;

use crate::{
    error::LotRef,
    lots::{Lot, LotType},
    rates::ResolvedRate,
};

/// Flat capital gains tax rate. Losses are not taxed and not netted.
pub const TAX_RATE: f64 = 0.30;

/// Gain figures of one lot, in the local currency, unrounded.
#[derive(Debug, Clone, PartialEq)]
pub struct LotResult {
    pub lot: LotRef,
    pub symbol: Option<String>,
    pub lot_type: LotType,
    pub sell_date: Date,
    pub buy_date: Date,
    pub quantity: f64,
    pub sell_price: f64,
    pub buy_price: f64,
    pub sell_rate: ResolvedRate,
    pub buy_rate: ResolvedRate,
    pub proceeds: f64,
    pub cost: f64,
    pub espp_gain: f64,
    pub profit: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub proceeds: f64,
    pub cost: f64,
    pub espp_gain: f64,
    pub profit: f64,
    pub tax: f64,
}

/// `None` for a lot whose rates were not resolved.
pub fn compute_lot(lot: &Lot) -> Option<LotResult> {
    let (sell_rate, buy_rate) = lot.rates()?;
    let proceeds = sell_rate.rate * lot.sell_price * lot.quantity;
    let cost = buy_rate.rate * lot.buy_price * lot.quantity;
    let espp_gain = lot
        .espp_discount_price
        .map(|paid| (lot.buy_price - paid) * lot.quantity * sell_rate.rate)
        .unwrap_or(0.);
    let profit = proceeds - cost;
    let tax = if profit > 0. { profit * TAX_RATE } else { 0. };
    Some(LotResult {
        lot: lot.id.clone(),
        symbol: lot.symbol.clone(),
        lot_type: lot.lot_type,
        sell_date: lot.sell_date,
        buy_date: lot.buy_date,
        quantity: lot.quantity,
        sell_price: lot.sell_price,
        buy_price: lot.buy_price,
        sell_rate,
        buy_rate,
        proceeds,
        cost,
        espp_gain,
        profit,
        tax,
    })
}

pub fn compute_totals<'a, I>(results: I) -> Totals
where
    I: IntoIterator<Item = &'a LotResult>,
{
    results.into_iter().fold(Totals::default(), |t, r| Totals {
        proceeds: t.proceeds + r.proceeds,
        cost: t.cost + r.cost,
        espp_gain: t.espp_gain + r.espp_gain,
        profit: t.profit + r.profit,
        tax: t.tax + r.tax,
    })
}
