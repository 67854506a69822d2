//! Feature derivation for the fraud classifier.
//!
//! Transforms transaction records into the exact ordered feature vectors the
//! trained model was fitted on. The column order comes from the model
//! artifact, never from this module.

use crate::error::PredictResult;
use crate::types::transaction::{TransactionRecord, TransactionType};

/// Balance-error features engineered from the raw balances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub amount_orig: f64,
    pub amount_dest: f64,
    pub error_balance_orig: f64,
    pub error_balance_dest: f64,
}

impl DerivedFeatures {
    pub fn from_record(tx: &TransactionRecord) -> Self {
        let amount_orig = tx.old_balance_orig - tx.new_balance_orig;
        let amount_dest = tx.old_balance_dest - tx.new_balance_dest;

        Self {
            amount_orig,
            amount_dest,
            error_balance_orig: tx.amount - amount_orig,
            error_balance_dest: tx.amount - amount_dest,
        }
    }
}

/// Where the value of one named column comes from
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Amount,
    OldBalanceOrig,
    NewBalanceOrig,
    OldBalanceDest,
    NewBalanceDest,
    AmountOrig,
    AmountDest,
    ErrorBalanceOrig,
    ErrorBalanceDest,
    /// One-hot indicator for a transaction category
    Indicator(TransactionType),
    /// Any other caller-supplied numeric field
    Extra(String),
}

impl Column {
    /// Resolve a column name from the artifact's ordered column list
    pub fn resolve(name: &str) -> Self {
        match name {
            "amount" => Column::Amount,
            "oldbalanceOrg" => Column::OldBalanceOrig,
            "newbalanceOrig" => Column::NewBalanceOrig,
            "oldbalanceDest" => Column::OldBalanceDest,
            "newbalanceDest" => Column::NewBalanceDest,
            "amountOrig" => Column::AmountOrig,
            "amountDest" => Column::AmountDest,
            "errorBalanceOrig" => Column::ErrorBalanceOrig,
            "errorBalanceDest" => Column::ErrorBalanceDest,
            other => match TransactionType::parse(other) {
                Some(kind) => Column::Indicator(kind),
                None => Column::Extra(other.to_string()),
            },
        }
    }

    fn value(
        &self,
        index: usize,
        tx: &TransactionRecord,
        derived: &DerivedFeatures,
        kind: Option<TransactionType>,
    ) -> PredictResult<f64> {
        Ok(match self {
            Column::Amount => tx.amount,
            Column::OldBalanceOrig => tx.old_balance_orig,
            Column::NewBalanceOrig => tx.new_balance_orig,
            Column::OldBalanceDest => tx.old_balance_dest,
            Column::NewBalanceDest => tx.new_balance_dest,
            Column::AmountOrig => derived.amount_orig,
            Column::AmountDest => derived.amount_dest,
            Column::ErrorBalanceOrig => derived.error_balance_orig,
            Column::ErrorBalanceDest => derived.error_balance_dest,
            Column::Indicator(category) => {
                if kind == Some(*category) {
                    1.0
                } else {
                    0.0
                }
            }
            Column::Extra(name) => tx.extra_numeric(index, name)?,
        })
    }
}

/// Feature extractor that transforms records into model input vectors.
///
/// Built once from the artifact's column list; values are emitted in exactly
/// that order.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureExtractor {
    pub fn new<S: AsRef<str>>(ordered_columns: &[S]) -> Self {
        let names: Vec<String> = ordered_columns
            .iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        let columns = names.iter().map(|n| Column::resolve(n)).collect();

        Self { names, columns }
    }

    /// Extract the feature vector for the record at `index` of its batch.
    ///
    /// The record is borrowed; nothing is written back into it.
    pub fn extract(&self, index: usize, tx: &TransactionRecord) -> PredictResult<Vec<f32>> {
        let derived = DerivedFeatures::from_record(tx);
        let kind = tx.transaction_type();

        self.columns
            .iter()
            .map(|column| {
                column
                    .value(index, tx, &derived, kind)
                    .map(|v| v as f32)
            })
            .collect()
    }

    /// Extract one vector per record, failing on the first bad record
    pub fn extract_batch(&self, records: &[TransactionRecord]) -> PredictResult<Vec<Vec<f32>>> {
        records
            .iter()
            .enumerate()
            .map(|(index, tx)| self.extract(index, tx))
            .collect()
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Get feature names in output order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Columns that must be supplied as extra fields on every record
    pub fn extra_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| match c {
                Column::Extra(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}
