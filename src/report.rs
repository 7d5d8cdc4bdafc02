use std::{
    io::{self, Write},
    path::Path,
};

use time::Date;

use crate::{
    config::ReportConfig,
    error::{LotError, LotWarning},
    gains::{compute_totals, LotResult, Totals, TAX_RATE},
    rates::ResolvedRate,
    Result, LOCAL_CURRENCY, SOURCE_CURRENCY,
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaxReport {
    /// Computed lots in export order.
    pub results: Vec<LotResult>,
    pub totals: Totals,
    /// Lots left out under the skip policy.
    pub excluded: Vec<LotError>,
    pub warnings: Vec<LotWarning>,
}

#[derive(Debug, PartialEq)]
pub struct SaleDay<'a> {
    pub date: Date,
    pub lots: Vec<&'a LotResult>,
    pub subtotal: Totals,
}

impl TaxReport {
    /// Results grouped by sale date, days in order of first appearance.
    pub fn by_sell_date(&self) -> Vec<SaleDay<'_>> {
        let mut days: Vec<SaleDay<'_>> = Vec::new();
        for r in &self.results {
            match days.iter_mut().find(|d| d.date == r.sell_date) {
                Some(day) => day.lots.push(r),
                None => days.push(SaleDay {
                    date: r.sell_date,
                    lots: vec![r],
                    subtotal: Totals::default(),
                }),
            }
        }
        for day in &mut days {
            day.subtotal = compute_totals(day.lots.iter().copied());
        }
        days
    }
}

fn bracket(rate: &ResolvedRate) -> String {
    if rate.is_exact() {
        "exact".to_string()
    } else {
        format!("{}..{}", rate.low_date, rate.high_date)
    }
}

fn write_totals<W: Write>(out: &mut W, totals: &Totals) -> io::Result<()> {
    writeln!(out, "Proceeds: {:.2} {LOCAL_CURRENCY}", totals.proceeds)?;
    writeln!(out, "Cost: {:.2} {LOCAL_CURRENCY}", totals.cost)?;
    writeln!(out, "ESPP discount gain: {:.2} {LOCAL_CURRENCY}", totals.espp_gain)?;
    writeln!(out, "Profit: {:.2} {LOCAL_CURRENCY}", totals.profit)?;
    writeln!(out, "Tax ({:.0}%): {:.2} {LOCAL_CURRENCY}", TAX_RATE * 100., totals.tax)
}

pub fn write_report<W: Write>(out: &mut W, report: &TaxReport, config: &ReportConfig) -> io::Result<()> {
    for day in report.by_sell_date() {
        writeln!(out, "\n=== SALES ON {} ===\n", day.date)?;
        if config.show_lots() {
            for r in &day.lots {
                writeln!(
                    out,
                    "{:<6} {:<9} {:>10.4} sold @ {SOURCE_CURRENCY} {:.2} x {:.4} ({}), acquired {} @ {SOURCE_CURRENCY} {:.2} x {:.4} ({}): profit {:.2}",
                    r.symbol.as_deref().unwrap_or("-"),
                    r.lot_type.to_string(),
                    r.quantity,
                    r.sell_price,
                    r.sell_rate.rate,
                    bracket(&r.sell_rate),
                    r.buy_date,
                    r.buy_price,
                    r.buy_rate.rate,
                    bracket(&r.buy_rate),
                    r.profit,
                )?;
            }
            writeln!(out)?;
        }
        write_totals(out, &day.subtotal)?;
    }

    writeln!(out, "\n=== TOTAL FOR {} LOTS ===\n", report.results.len())?;
    write_totals(out, &report.totals)?;

    if !report.excluded.is_empty() {
        writeln!(out, "\n=== EXCLUDED LOTS ===\n")?;
        for e in &report.excluded {
            writeln!(out, "{e}")?;
        }
    }
    if !report.warnings.is_empty() {
        writeln!(out, "\n=== WARNINGS ===\n")?;
        for w in &report.warnings {
            writeln!(out, "{w}")?;
        }
    }
    Ok(())
}

pub fn print_report(report: &TaxReport, config: &ReportConfig) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, config)?;
    out.flush()?;
    Ok(())
}

pub fn write_detail<W: Write>(results: &[LotResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "Sell Date",
        "Buy Date",
        "Type",
        "Symbol",
        "Quantity",
        "Sell Price",
        "Buy Price",
        "Sell Rate",
        "Sell Rate From",
        "Sell Rate To",
        "Buy Rate",
        "Buy Rate From",
        "Buy Rate To",
        "Proceeds",
        "Cost",
        "ESPP Gain",
        "Profit",
        "Tax",
    ])?;
    for r in results {
        wtr.write_record(&[
            r.sell_date.to_string(),
            r.buy_date.to_string(),
            r.lot_type.to_string(),
            r.symbol.clone().unwrap_or_default(),
            r.quantity.to_string(),
            r.sell_price.to_string(),
            r.buy_price.to_string(),
            r.sell_rate.rate.to_string(),
            r.sell_rate.low_date.to_string(),
            r.sell_rate.high_date.to_string(),
            r.buy_rate.rate.to_string(),
            r.buy_rate.low_date.to_string(),
            r.buy_rate.high_date.to_string(),
            r.proceeds.to_string(),
            r.cost.to_string(),
            r.espp_gain.to_string(),
            r.profit.to_string(),
            r.tax.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_detail_as_csv<P: AsRef<Path>>(results: &[LotResult], file_path: P) -> Result<()> {
    let file = std::fs::File::create(&file_path)?;
    write_detail(results, file)?;
    log::info!(
        "lot detail written as CSV to {}",
        file_path.as_ref().to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::{error::LotRef, lots::LotType};

    fn result(index: usize, sell_date: Date, profit: f64) -> LotResult {
        let rate = ResolvedRate {
            rate: 10.,
            low_date: date!(2023 - 01 - 02),
            high_date: date!(2023 - 01 - 09),
        };
        LotResult {
            lot: LotRef {
                index,
                date: sell_date.to_string(),
                kind: "RS".to_string(),
            },
            symbol: (index != 2).then(|| "ACME".to_string()),
            lot_type: LotType::RestrictedStockVest,
            sell_date,
            buy_date: date!(2023 - 01 - 02),
            quantity: 1.,
            sell_price: 10.,
            buy_price: 10.,
            sell_rate: rate,
            buy_rate: rate,
            proceeds: 100. + profit,
            cost: 100.,
            espp_gain: 0.,
            profit,
            tax: if profit > 0. { profit * TAX_RATE } else { 0. },
        }
    }

    fn report() -> TaxReport {
        let results = vec![
            result(1, date!(2023 - 03 - 15), 10.),
            result(2, date!(2023 - 02 - 01), -5.),
            result(3, date!(2023 - 03 - 15), 20.),
        ];
        TaxReport {
            totals: compute_totals(&results),
            results,
            ..TaxReport::default()
        }
    }

    #[test]
    fn groups_by_sale_date_in_first_seen_order() {
        let report = report();
        let days = report.by_sell_date();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date!(2023 - 03 - 15));
        assert_eq!(
            days[0].lots.iter().map(|r| r.lot.index).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(days[0].subtotal.profit, 30.);
        assert_eq!(days[1].subtotal.tax, 0.);
    }

    #[test]
    fn renders_rounded_totals() {
        let mut out = Vec::new();
        write_report(&mut out, &report(), &ReportConfig::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("=== SALES ON 2023-03-15 ==="));
        assert!(text.contains("=== TOTAL FOR 3 LOTS ==="));
        assert!(text.contains("Profit: 25.00 SEK"));
        assert!(text.contains("Tax (30%): 9.00 SEK"));
        assert!(!text.contains("EXCLUDED"));
        assert!(!text.contains("exact"));
    }

    #[test]
    fn verbose_report_lists_lots_and_brackets() {
        let config = ReportConfig {
            verbosity: 1,
            ..ReportConfig::default()
        };
        let mut out = Vec::new();
        write_report(&mut out, &report(), &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("(2023-01-02..2023-01-09)"));
        assert!(text.contains("ACME   RS"));
        assert!(text.contains("-      RS"));
    }

    #[test]
    fn csv_has_one_row_per_lot() {
        let mut out = Vec::new();
        write_detail(&report().results, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Sell Date,Buy Date,Type,Symbol,Quantity"));
        assert!(lines[1].starts_with("2023-03-15,2023-01-02,RS,ACME,1,10,10,10,2023-01-02,2023-01-09"));
        assert!(lines[2].starts_with("2023-02-01,2023-01-02,RS,,1,"));
    }
}
