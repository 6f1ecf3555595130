//! Tax-rate lookup
//!
//! Consumed as a pure function when pricing an order at creation. The rate
//! source lives outside this engine; the constant here stands in for the
//! jurisdictional lookup the host wires up.

use rust_decimal::Decimal;

/// Current tax rate as a percentage (8 means 8%)
pub fn current_tax_rate() -> Decimal {
    Decimal::new(8, 0)
}

/// Tax owed on the given base amount
pub fn tax_on(amount: Decimal) -> Decimal {
    (amount * current_tax_rate() / Decimal::new(100, 0)).round_dp(2)
}
