//! Test Transaction Client
//!
//! Generates PaySim-style transactions and posts them in batches to the
//! predict endpoint.

use anyhow::Context;
use fraud_classifier_service::{PredictionResponse, TransactionRecord};
use rand::Rng;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    step: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            step: 0,
        }
    }

    /// Generate a random legitimate transaction with consistent balances
    fn generate_legitimate(&mut self) -> TransactionRecord {
        self.step += 1;
        let kind = self.random_choice(&["PAYMENT", "CASH_IN", "DEBIT", "CASH_OUT", "TRANSFER"]);
        let amount: f64 = self.rng.gen_range(10.0..5000.0);
        let old_orig: f64 = self.rng.gen_range(amount..amount + 50_000.0);
        let old_dest: f64 = self.rng.gen_range(0.0..100_000.0);

        let (new_orig, new_dest) = if kind == "CASH_IN" {
            (old_orig + amount, (old_dest - amount).max(0.0))
        } else {
            (old_orig - amount, old_dest + amount)
        };

        TransactionRecord::new(kind, amount, old_orig, new_orig, old_dest, new_dest)
            .with_extra("step", json!(self.step))
            .with_extra("nameOrig", json!(format!("C{:09}", self.rng.gen_range(0..1_000_000_000u64))))
    }

    /// Generate a suspicious transaction: the origin account is drained and
    /// the destination balance never moves
    fn generate_suspicious(&mut self) -> TransactionRecord {
        self.step += 1;
        let kind = self.random_choice(&["TRANSFER", "CASH_OUT"]);
        let amount: f64 = self.rng.gen_range(50_000.0..2_000_000.0);

        TransactionRecord::new(kind, amount, amount, 0.0, 0.0, 0.0)
            .with_extra("step", json!(self.step))
            .with_extra("nameOrig", json!(format!("C{:09}", self.rng.gen_range(0..1_000_000_000u64))))
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args.get(1).map(|s| s.as_str()).unwrap_or("http://127.0.0.1:8890");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let batch_size: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10).max(1);
    let fraud_rate = parse_fraud_rate(args.get(4).map(|s| s.as_str()))?;
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        base_url = %base_url,
        count = count,
        batch_size = batch_size,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    if let Err(e) = client.get(base_url).send().await {
        warn!(error = %e, "Service unreachable. Running in dry-run mode.");
        return run_dry_mode(count, fraud_rate).await;
    }

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let predict_url = format!("{}/predict", base_url.trim_end_matches('/'));

    let mut sent = 0;
    let mut suspicious_sent = 0;
    let mut flagged = 0;

    while sent < count {
        let size = batch_size.min(count - sent);
        let batch: Vec<TransactionRecord> = (0..size)
            .map(|_| {
                if rng.gen_bool(fraud_rate) {
                    suspicious_sent += 1;
                    generator.generate_suspicious()
                } else {
                    generator.generate_legitimate()
                }
            })
            .collect();

        let start_time = Instant::now();
        let response = client
            .post(&predict_url)
            .json(&json!({ "data": batch }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Batch rejected");
        } else {
            let predictions: PredictionResponse = response.json().await?;
            flagged += predictions.fraud_count();
            info!(
                batch = size,
                fraud = predictions.fraud_count(),
                latency_ms = start_time.elapsed().as_millis() as u64,
                "Batch classified"
            );
        }

        sent += size;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} transactions ({} suspicious), {} labelled Fraud",
        sent, suspicious_sent, flagged
    );

    Ok(())
}

/// Share of suspicious transactions, a probability in [0, 1]
fn parse_fraud_rate(arg: Option<&str>) -> anyhow::Result<f64> {
    let Some(raw) = arg else {
        return Ok(0.1);
    };
    let rate: f64 = raw
        .parse()
        .with_context(|| format!("fraud_rate must be a number, got `{}`", raw))?;
    if !(0.0..=1.0).contains(&rate) {
        anyhow::bail!("fraud_rate must be within [0, 1], got {}", rate);
    }
    Ok(rate)
}

async fn run_dry_mode(count: usize, fraud_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no service connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&transaction)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_argument() {
        assert_eq!(parse_fraud_rate(None).unwrap(), 0.1);
        assert_eq!(parse_fraud_rate(Some("0.25")).unwrap(), 0.25);
        assert_eq!(parse_fraud_rate(Some("1")).unwrap(), 1.0);

        assert!(parse_fraud_rate(Some("1.5")).is_err());
        assert!(parse_fraud_rate(Some("-0.1")).is_err());
        assert!(parse_fraud_rate(Some("NaN")).is_err());
        assert!(parse_fraud_rate(Some("often")).is_err());
    }
}
