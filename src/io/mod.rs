//! I/O handling for the offline reconciliation tool
//!
//! CSV format concerns live in [`csv_format`]; [`reader`] provides the
//! streaming row iterators over the two input files.

pub mod csv_format;
pub mod reader;

pub use csv_format::{write_wallets_csv, PendingDeposit};
pub use reader::{CallbackReader, PendingReader};
