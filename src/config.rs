//! Engine configuration
//!
//! Settings shared by the pricing and ledger components. Values are
//! deserializable so a host application can load them from its own config
//! source; [`EngineConfig::default`] matches the production defaults.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Engine-wide settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Currency code applied to wallets and orders
    pub currency: String,

    /// Platform service fee as a fraction of the rental amount (0.05 = 5%)
    pub service_fee_rate: Decimal,

    /// Description attached to outbound deposit payment requests
    pub deposit_description: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "VND".to_string(),
            service_fee_rate: Decimal::new(5, 2),
            deposit_description: "Wallet deposit".to_string(),
        }
    }
}
