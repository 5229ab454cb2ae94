//! Configuration surface named in the recognized-keys section: portfolio
//! allocation, classifier/planner/scheduler tuning, and adapter limits. The
//! loader layers defaults, an optional file, then `KAIROS__`-prefixed
//! environment variables, grounded on `config = "0.14"` the way
//! `songminkyu-zeroquant` pulls it in for the same purpose.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;

use kairos_coordinator::CoordinatorConfig;
use kairos_core::{IntraCryptoAllocation, Krw};
use kairos_scheduler::SchedulerConfig;

const DEFAULTS_TOML: &str = r#"
database_url = "sqlite://kairos.db"
lock_path = "kairos.lock"

[portfolio.intra_crypto]
btc = 0.40
eth = 0.30
xrp = 0.15
sol = 0.15

[classifier]
buffer_band = 0.05

[planner]
min_notional_krw = 10000

[scheduler]
tick_cadence_minutes = 15
drift_threshold = 0.03
drift_min_gap_krw = 20000
drift_cooldown_minutes = 30
execution_timeout_hours = 24

[adapter]
max_retries = 3
safety_margin = 0.01
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    pub intra_crypto: IntraCryptoAllocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub buffer_band: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    pub min_notional_krw: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub tick_cadence_minutes: i64,
    pub drift_threshold: Decimal,
    pub drift_min_gap_krw: i64,
    pub drift_cooldown_minutes: i64,
    pub execution_timeout_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub max_retries: u32,
    pub safety_margin: Decimal,
}

/// Deserialized configuration surface. `exchange.*` and `RUST_LOG` live in
/// the environment only (credentials never belong in a config file).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Path to the advisory lock file enforcing the singleton invariant —
    /// at most one coordinator instance writing to `database_url` at a time.
    pub lock_path: String,
    pub portfolio: PortfolioConfig,
    pub classifier: ClassifierConfig,
    pub planner: PlannerConfig,
    pub scheduler: SchedulerSettings,
    pub adapter: AdapterConfig,
}

impl AppConfig {
    /// Layers built-in defaults, an optional `--config` file, then
    /// `KAIROS__SECTION__KEY`-style environment overrides.
    pub fn load(file_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS_TOML, config::FileFormat::Toml));

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("KAIROS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        IntraCryptoAllocation::new(
            self.portfolio.intra_crypto.btc,
            self.portfolio.intra_crypto.eth,
            self.portfolio.intra_crypto.xrp,
            self.portfolio.intra_crypto.sol,
        )
        .map_err(|e| anyhow::anyhow!("invalid portfolio.intra_crypto: {e}"))?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            tick_cadence: Duration::minutes(self.scheduler.tick_cadence_minutes),
            drift_threshold: self.scheduler.drift_threshold,
            drift_min_gap_krw: Krw(self.scheduler.drift_min_gap_krw),
            drift_cooldown: Duration::minutes(self.scheduler.drift_cooldown_minutes),
            execution_timeout: Duration::hours(self.scheduler.execution_timeout_hours),
            min_notional: Krw(self.planner.min_notional_krw),
            ..defaults
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            intra_crypto: self.portfolio.intra_crypto,
            buffer_band: self.classifier.buffer_band,
            min_notional: Krw(self.planner.min_notional_krw),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::load(None).expect("built-in defaults must deserialize")
    }
}
