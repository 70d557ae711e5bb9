use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use primitives::Address;
use serde::{Deserialize, Serialize};

/// Ledger settings, layered from defaults, an optional TOML file and `SHIELDED_LEDGER_*` env vars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The address that holds the pool's custody balance
    pub address: Address,
    /// How many recent roots spends may prove against
    pub root_history_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            address: Address::from_low_u64_be(0x0050_0100),
            root_history_size: 100,
        }
    }
}

impl LedgerConfig {
    pub const ENV_PREFIX: &'static str = "SHIELDED_LEDGER_";

    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };

        figment.merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }
}
