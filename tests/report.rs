use std::cell::RefCell;

use capital_gain_tax_sweden::{
    compute_report,
    config::ErrorPolicy,
    error::{LotError, ProviderError, RateError, SeriesError, Side},
    lots::{LotType, TransactionRecord},
    provider::RateProvider,
    rates::{RateObservation, RateSeries},
    schwab::parse_export,
};
use time::{macros::date, Date};

const EXPORT: &str = include_str!("fixtures/transactions.json");

fn series() -> RateSeries {
    RateSeries::new(
        [
            (date!(2022 - 12 - 01), 9.8),
            (date!(2023 - 01 - 02), 10.0),
            (date!(2023 - 01 - 09), 10.5),
            (date!(2023 - 02 - 10), 10.6),
        ]
        .into_iter()
        .map(|(date, value)| RateObservation { date, value })
        .collect(),
    )
    .unwrap()
}

struct Recording {
    series: RateSeries,
    requests: RefCell<Vec<(Date, Date)>>,
}

impl RateProvider for Recording {
    fn load(&self, from: Date, to: Date) -> Result<RateSeries, ProviderError> {
        self.requests.borrow_mut().push((from, to));
        Ok(self.series.clone())
    }
}

struct Unavailable;

impl RateProvider for Unavailable {
    fn load(&self, _from: Date, _to: Date) -> Result<RateSeries, ProviderError> {
        Err(ProviderError::Series(SeriesError::InvalidDate {
            value: "n/a".to_string(),
        }))
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn computes_every_sale_in_export_order() {
    let records = parse_export(EXPORT).unwrap();
    let provider = Recording {
        series: series(),
        requests: RefCell::new(Vec::new()),
    };
    let report = compute_report(&records, &provider, ErrorPolicy::Abort).unwrap();

    assert_eq!(
        provider.requests.borrow().as_slice(),
        &[(date!(2022 - 11 - 30), date!(2023 - 02 - 09))]
    );
    assert!(report.excluded.is_empty());
    assert!(report.warnings.is_empty());
    assert_eq!(report.results.len(), 2);

    let espp = &report.results[0];
    assert_eq!(espp.lot_type, LotType::Espp);
    assert_eq!(espp.symbol.as_deref(), Some("ACME"));
    assert_eq!(espp.sell_rate.rate, 10.5);
    assert!(espp.sell_rate.is_exact());
    assert!(close(espp.buy_rate.rate, 9.9));
    assert_eq!(
        (espp.buy_rate.low_date, espp.buy_rate.high_date),
        (date!(2022 - 12 - 01), date!(2023 - 01 - 02))
    );
    assert_eq!(espp.proceeds, 1050.0);
    assert!(close(espp.cost, 1188.0));
    assert!(espp.profit < 0.);
    assert_eq!(espp.tax, 0.0);
    assert_eq!(espp.espp_gain, 189.0);

    let rs = &report.results[1];
    assert_eq!(rs.lot_type, LotType::RestrictedStockVest);
    assert_eq!(rs.sell_rate.rate, 10.25);
    assert_eq!(rs.buy_rate.rate, 10.0);
    assert_eq!(rs.proceeds, 10250.0);
    assert_eq!(rs.cost, 9000.0);
    assert_eq!(rs.profit, 1250.0);
    assert!(close(rs.tax, 375.0));

    assert!(close(report.totals.profit, espp.profit + rs.profit));
    assert!(close(report.totals.tax, rs.tax));
    assert_eq!(report.totals.espp_gain, 189.0);
}

fn records_with_bad_lots() -> Vec<TransactionRecord> {
    let mut records = parse_export(EXPORT).unwrap();
    records.extend(
        parse_export(
            r#"[
                {"Date": "01/06/2023", "Action": "Sale", "TransactionDetails": [
                    {"Details": {"Type": "Warrant", "Shares": "1", "SalePrice": "$1.00"}}
                ]},
                {"Date": "03/20/2023", "Action": "Sale", "TransactionDetails": [
                    {"Details": {"Type": "Div Reinv", "Shares": "1", "SalePrice": "$1.00",
                                 "PurchaseDate": "01/03/2023", "PurchasePrice": "$1.00"}}
                ]}
            ]"#,
        )
        .unwrap(),
    );
    records
}

#[test]
fn skip_policy_lists_excluded_lots() {
    let report = compute_report(&records_with_bad_lots(), &series(), ErrorPolicy::Skip).unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.excluded.len(), 2);

    assert!(matches!(&report.excluded[0], LotError::UnknownLotType { lot } if lot.index == 3));
    assert!(matches!(
        &report.excluded[1],
        LotError::UnresolvableRate {
            lot,
            side: Side::Sell,
            source: RateError::AfterLast { .. },
        } if lot.index == 4 && lot.date == "03/20/2023"
    ));
    let indices: Vec<usize> = report.results.iter().map(|r| r.lot.index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn abort_policy_fails_the_run() {
    let err = compute_report(&records_with_bad_lots(), &series(), ErrorPolicy::Abort).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LotError>(),
        Some(LotError::UnknownLotType { .. })
    ));
}

#[test]
fn flags_lots_sold_before_acquisition() {
    let records = parse_export(
        r#"[{"Date": "01/05/2023", "Action": "Sale", "TransactionDetails": [
            {"Details": {"Type": "Div Reinv", "Shares": "1", "SalePrice": "$10.00",
                         "PurchaseDate": "01/09/2023", "PurchasePrice": "$8.00"}}
        ]}]"#,
    )
    .unwrap();
    let report = compute_report(&records, &series(), ErrorPolicy::Abort).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].lot.index, 1);
}

#[test]
fn excluded_lots_are_not_also_warned() {
    let records = parse_export(
        r#"[{"Date": "01/05/2031", "Action": "Sale", "TransactionDetails": [
            {"Details": {"Type": "Div Reinv", "Shares": "1", "SalePrice": "$10.00",
                         "PurchaseDate": "01/09/2031", "PurchasePrice": "$8.00"}}
        ]}]"#,
    )
    .unwrap();
    let report = compute_report(&records, &series(), ErrorPolicy::Skip).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.excluded.len(), 1);
    assert!(report.warnings.is_empty());
}

#[test]
fn unavailable_rates_fail_the_run() {
    let records = parse_export(EXPORT).unwrap();
    let err = compute_report(&records, &Unavailable, ErrorPolicy::Skip).unwrap_err();
    assert!(err.downcast_ref::<ProviderError>().is_some());
}

#[test]
fn export_without_sales_needs_no_rates() {
    let records = parse_export(r#"{"Transactions": [{"Date": "01/05/2023", "Action": "Deposit"}]}"#).unwrap();
    let report = compute_report(&records, &Unavailable, ErrorPolicy::Abort).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.totals.profit, 0.0);
}
