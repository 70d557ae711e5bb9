use std::{path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use primitives::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Client settings, layered from defaults, an optional TOML file and `SHIELDED_*` env vars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the prove server
    pub prover_url: String,
    /// How long one proof may take before the attempt is abandoned
    pub prover_timeout_secs: u64,
    /// How long selected notes stay reserved for an in-flight spend
    pub lease_secs: u64,
    /// Where notes are persisted; in memory when unset
    pub note_db_path: Option<PathBuf>,
    /// Relayer paid by spends that carry a fee
    pub relayer: Option<Address>,
    /// Fee offered to the relayer per spend
    pub fee: Amount,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            prover_url: "http://localhost:3001".to_string(),
            prover_timeout_secs: 120,
            lease_secs: 300,
            note_db_path: None,
            relayer: None,
            fee: Amount::ZERO,
        }
    }
}

impl ClientConfig {
    pub const ENV_PREFIX: &'static str = "SHIELDED_";

    #[must_use]
    pub fn figment(path: Option<&std::path::Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };

        figment.merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn load(path: Option<&std::path::Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    #[must_use]
    pub fn prover_timeout(&self) -> Duration {
        Duration::from_secs(self.prover_timeout_secs)
    }

    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}
