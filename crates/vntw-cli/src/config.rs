//! Deployment configuration
//!
//! Loaded from a TOML file with `VNTW_` environment overrides, e.g.
//! `VNTW_TOKEN__BURN_RATE_BPS=500`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vntw_core::{Address, Amount, Timestamp};
use vntw_token::{constants, DeployParams};

/// Complete deployment configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Token parameters
    #[serde(default)]
    pub token: TokenSettings,

    /// Vesting contract funding
    #[serde(default)]
    pub vesting: VestingSettings,

    /// Dev pool signer set
    #[serde(default)]
    pub dev_pool: DevPoolSettings,

    /// Schedules created right after deployment
    #[serde(default)]
    pub schedules: Vec<ScheduleSettings>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Token settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Initial supply in smallest units
    #[serde(default = "default_initial_supply", with = "amount_format")]
    pub initial_supply: Amount,

    #[serde(default)]
    pub burn_rate_bps: u32,

    /// Admin and vesting owner (`@label` or hex)
    #[serde(default = "default_deployer")]
    pub deployer: String,
}

fn default_name() -> String {
    constants::NAME.to_string()
}

fn default_symbol() -> String {
    constants::SYMBOL.to_string()
}

fn default_initial_supply() -> Amount {
    1_000_000_000 * constants::ONE_VNTW
}

fn default_deployer() -> String {
    "@deployer".to_string()
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            symbol: default_symbol(),
            initial_supply: default_initial_supply(),
            burn_rate_bps: 0,
            deployer: default_deployer(),
        }
    }
}

/// Vesting settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VestingSettings {
    /// Part of the initial supply minted into the vesting account
    #[serde(default, with = "amount_format")]
    pub reserve: Amount,
}

/// Dev pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevPoolSettings {
    #[serde(default)]
    pub signers: Vec<String>,

    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

fn default_threshold() -> usize {
    constants::DEFAULT_THRESHOLD
}

impl Default for DevPoolSettings {
    fn default() -> Self {
        Self {
            signers: Vec::new(),
            threshold: default_threshold(),
        }
    }
}

/// One vesting schedule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub beneficiary: String,

    #[serde(with = "amount_format")]
    pub amount: Amount,

    pub start: Timestamp,

    #[serde(default)]
    pub cliff: Timestamp,

    pub duration: Timestamp,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl DeployConfig {
    /// Load from a TOML file, applying `VNTW_` environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("VNTW")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading deployment config {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("parsing deployment config {}", path.display()))
    }

    /// Sample configuration written by `vntw init-config`
    pub fn sample() -> Self {
        let one = constants::ONE_VNTW;
        Self {
            token: TokenSettings::default(),
            vesting: VestingSettings {
                reserve: 200_000_000 * one,
            },
            dev_pool: DevPoolSettings {
                signers: vec!["@alice".into(), "@bob".into(), "@carol".into()],
                threshold: 2,
            },
            schedules: vec![ScheduleSettings {
                beneficiary: "@team".into(),
                amount: 120_000_000 * one,
                start: 1_767_225_600, // 2026-01-01
                cliff: 90 * 24 * 3600,
                duration: 365 * 24 * 3600,
            }],
            logging: LoggingConfig::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing deployment config")
    }

    /// Resolve addresses and build deployment parameters
    pub fn deploy_params(&self) -> Result<DeployParams> {
        let signers = self
            .dev_pool
            .signers
            .iter()
            .map(|s| parse_address(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(DeployParams {
            name: self.token.name.clone(),
            symbol: self.token.symbol.clone(),
            initial_supply: self.token.initial_supply,
            burn_rate_bps: self.token.burn_rate_bps,
            deployer: parse_address(&self.token.deployer)?,
            vesting_reserve: self.vesting.reserve,
            signers,
            threshold: self.dev_pool.threshold,
        })
    }
}

/// Parse `@label` or hex into an address
pub fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .with_context(|| format!("invalid address {:?}", s))
}

/// Amounts exceed TOML's 64-bit integers, so they are written as strings
/// and read from either strings or integers.
mod amount_format {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use vntw_core::Amount;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(v as Amount)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.trim()
                .replace('_', "")
                .parse()
                .map_err(|_| E::custom(format!("invalid amount {:?}", v)))
        }
    }
}
