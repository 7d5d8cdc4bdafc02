use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::{lots::TransactionRecord, Result};

/// Equity Award Center export: either the full document or just its transactions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Document {
        #[serde(rename = "Transactions")]
        transactions: Vec<TransactionRecord>,
    },
    Transactions(Vec<TransactionRecord>),
}

pub fn parse_export(json: &str) -> Result<Vec<TransactionRecord>> {
    let export: ExportFile =
        serde_json::from_str(json).context("export is not a Schwab transaction history")?;
    Ok(match export {
        ExportFile::Document { transactions } | ExportFile::Transactions(transactions) => {
            transactions
        }
    })
}

pub fn read_export<P: AsRef<Path>>(file_path: P) -> Result<Vec<TransactionRecord>> {
    let path = file_path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records = parse_export(&json).with_context(|| format!("failed to parse {}", path.display()))?;
    log::info!("read {} transactions from {}", records.len(), path.display());
    Ok(records)
}
