//! CSV format handling for reconciliation inputs and the wallet statement
//!
//! This module centralizes the CSV concerns of the offline reconciliation
//! tool:
//! - pending deposit dump records (input)
//! - gateway settlement callback records (input)
//! - wallet statement output
//!
//! All functions are pure (no I/O) for easy testing.

use crate::core::webhook::GatewayCallback;
use crate::types::{UserId, Wallet};
use rust_decimal::Decimal;
use std::io::Write;
use std::str::FromStr;

/// CSV record for one pending deposit, as dumped from the ledger
///
/// Columns: user, order_code, amount
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PendingCsvRecord {
    pub user: UserId,
    pub order_code: String,
    pub amount: String,
}

/// A parsed pending deposit awaiting import into the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeposit {
    pub user: UserId,
    pub order_code: String,
    pub amount: Decimal,
}

/// CSV record for one gateway callback, as exported by the gateway
///
/// Columns: order_code, amount, status. The amount column may be empty for
/// failure callbacks.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CallbackCsvRecord {
    pub order_code: String,
    pub amount: Option<String>,
    pub status: String,
}

/// Convert a PendingCsvRecord to a PendingDeposit
///
/// Validates the order code is present and the amount parses as a decimal.
pub fn convert_pending_record(record: PendingCsvRecord) -> Result<PendingDeposit, String> {
    if record.order_code.trim().is_empty() {
        return Err(format!("Missing order code for user {}", record.user));
    }
    let amount = Decimal::from_str(record.amount.trim()).map_err(|_| {
        format!(
            "Invalid amount '{}' for order code {}",
            record.amount, record.order_code
        )
    })?;
    Ok(PendingDeposit {
        user: record.user,
        order_code: record.order_code.trim().to_string(),
        amount,
    })
}

/// Convert a CallbackCsvRecord to a GatewayCallback
///
/// An absent or empty amount parses as zero, which only failure callbacks
/// carry in practice.
pub fn convert_callback_record(record: CallbackCsvRecord) -> Result<GatewayCallback, String> {
    if record.order_code.trim().is_empty() {
        return Err("Missing order code in callback".to_string());
    }
    if record.status.trim().is_empty() {
        return Err(format!(
            "Missing status code for order code {}",
            record.order_code
        ));
    }

    let amount_paid = match record.amount {
        Some(amount_str) if !amount_str.trim().is_empty() => Decimal::from_str(amount_str.trim())
            .map_err(|_| {
                format!(
                    "Invalid amount '{}' for order code {}",
                    amount_str, record.order_code
                )
            })?,
        _ => Decimal::ZERO,
    };

    Ok(GatewayCallback {
        order_code: record.order_code.trim().to_string(),
        amount_paid,
        status_code: record.status.trim().to_string(),
    })
}

/// Write wallet balances to CSV format
///
/// Columns: user, balance, currency. Wallets are sorted by user id for
/// deterministic output.
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "balance", "currency"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_wallets = wallets.to_vec();
    sorted_wallets.sort_by_key(|wallet| wallet.user);

    for wallet in sorted_wallets {
        writer
            .write_record(&[
                wallet.user.to_string(),
                wallet.balance.to_string(),
                wallet.currency.clone(),
            ])
            .map_err(|e| format!("Failed to write wallet record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
