use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SolaceConfig {
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub aggregation: AggregationConfig,
    pub probing: ProbingConfig,
    pub crisis: CrisisConfig,
    pub coaching: CoachingConfig,
}

impl SolaceConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SolaceConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SOLACE_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Ok(v) = std::env::var("SOLACE_AGGREGATION_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.aggregation.interval = n;
            }
        }
        if let Ok(v) = std::env::var("SOLACE_PROBING_COOLDOWN_HOURS") {
            if let Ok(n) = v.parse() {
                self.probing.cooldown_hours = n;
            }
        }
        if let Ok(v) = std::env::var("SOLACE_CRISIS_SENTIMENT_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.crisis.sentiment_threshold = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "solace.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run aggregation on a spawned task instead of inside the turn.
    pub defer_aggregation: bool,
    /// Skip the probing scheduler when the crisis verdict is at least moderate.
    pub suppress_probing_in_crisis: bool,
    /// Select a therapeutic exercise for the safety wrapper when one fits.
    pub offer_exercises: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            defer_aggregation: false,
            suppress_probing_in_crisis: true,
            offer_exercises: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Aggregate after every Nth stored insight.
    pub interval: u64,
    /// Number of most recent ledger entries folded into the profile.
    pub window: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval: 5,
            window: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    pub enabled: bool,
    pub min_conversations: u32,
    pub cooldown_hours: i64,
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_conversations: 3,
            cooldown_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    /// Sentiment below this forces at least `low` severity.
    pub sentiment_threshold: f32,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            sentiment_threshold: -0.6,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoachingConfig {
    /// Replace the active plan when the profile changes materially.
    pub auto_refresh: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = SolaceConfig::default();
        assert_eq!(cfg.aggregation.interval, 5);
        assert_eq!(cfg.aggregation.window, 100);
        assert_eq!(cfg.probing.cooldown_hours, 48);
        assert_eq!(cfg.probing.min_conversations, 3);
        assert!(!cfg.coaching.auto_refresh);
        assert!(cfg.pipeline.suppress_probing_in_crisis);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[storage]
db_path = "data/solace.db"
"#;
        let cfg: SolaceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.storage.db_path, "data/solace.db");
        // Defaults for unspecified fields
        assert_eq!(cfg.aggregation.interval, 5);
        assert!((cfg.crisis.sentiment_threshold + 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[storage]
db_path = "/var/lib/solace.db"

[pipeline]
defer_aggregation = true
suppress_probing_in_crisis = false
offer_exercises = false

[aggregation]
interval = 10
window = 50

[probing]
enabled = false
min_conversations = 5
cooldown_hours = 72

[crisis]
sentiment_threshold = -0.4

[coaching]
auto_refresh = true
"#;
        let cfg: SolaceConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.pipeline.defer_aggregation);
        assert!(!cfg.pipeline.offer_exercises);
        assert_eq!(cfg.aggregation.interval, 10);
        assert_eq!(cfg.aggregation.window, 50);
        assert!(!cfg.probing.enabled);
        assert_eq!(cfg.probing.cooldown_hours, 72);
        assert!(cfg.coaching.auto_refresh);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("SOLACE_AGGREGATION_INTERVAL", "7");
        std::env::set_var("SOLACE_PROBING_COOLDOWN_HOURS", "not-a-number");

        let mut cfg = SolaceConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.aggregation.interval, 7);
        // Unparseable override is ignored
        assert_eq!(cfg.probing.cooldown_hours, 48);

        std::env::remove_var("SOLACE_AGGREGATION_INTERVAL");
        std::env::remove_var("SOLACE_PROBING_COOLDOWN_HOURS");

        let cfg = SolaceConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.aggregation.interval, 5);
    }
}
