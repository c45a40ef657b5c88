//! TOML selection configuration.
//!
//! Every key except `budget` is optional. Multiplier and weight tables
//! override the built-in defaults per category rather than replacing them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rosterlab_core::domain::{Category, Formation};
use rosterlab_core::features::DerivationMode;
use rosterlab_core::params::{
    default_category_weight, default_leader_multiplier, AllocationParams, BackupPolicy, FinalizeParams,
    ParamsError, PremiumRule, ScoringParams, SelectionParams,
};
use rosterlab_core::scoring::{AutoRound, LastRoundBlend, PriceProxy, ScoreAdjustment};
use rosterlab_core::trap::TrapDetector;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown formation '{0}'")]
    UnknownFormation(String),
    #[error("formation '{0}' is defined twice")]
    DuplicateFormation(String),
    #[error("no formations configured")]
    NoFormations,
    #[error("history_window must be at least 1")]
    ZeroWindow,
    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// Pre-allocation score adjustment selected by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    None,
    /// Price proxy before the first round, last-round blend after it.
    #[default]
    Auto,
    PriceProxy,
    LastRoundBlend,
}

impl AdjustmentKind {
    pub fn hook(self) -> Option<Box<dyn ScoreAdjustment>> {
        match self {
            Self::None => None,
            Self::Auto => Some(Box::new(AutoRound::default())),
            Self::PriceProxy => Some(Box::new(PriceProxy::default())),
            Self::LastRoundBlend => Some(Box::new(LastRoundBlend::default())),
        }
    }
}

/// A formation defined in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFormation {
    pub name: String,
    #[serde(flatten)]
    pub slots: BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    pub budget: f64,
    #[serde(default = "default_formations")]
    pub formations: Vec<String>,
    #[serde(default)]
    pub mode: DerivationMode,
    #[serde(default)]
    pub include_doubtful: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_local_search_cap")]
    pub local_search_cap: usize,
    #[serde(default = "default_exact_state_limit")]
    pub exact_state_limit: u64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub backup_policy: BackupPolicy,
    #[serde(default)]
    pub adjustment: AdjustmentKind,
    /// Wall-clock guard for multi-formation runs; 0 disables it.
    #[serde(default)]
    pub deadline_ms: u64,
    #[serde(default)]
    pub leader_multiplier: BTreeMap<Category, f64>,
    #[serde(default)]
    pub category_weight: BTreeMap<Category, f64>,
    #[serde(default)]
    pub premium: PremiumRule,
    #[serde(default)]
    pub trap: TrapDetector,
    #[serde(default)]
    pub custom_formations: Vec<CustomFormation>,
}

fn default_formations() -> Vec<String> {
    vec!["4-3-3".to_string()]
}

fn default_top_k() -> usize {
    20
}

fn default_local_search_cap() -> usize {
    100
}

fn default_exact_state_limit() -> u64 {
    20_000_000
}

fn default_history_window() -> usize {
    rosterlab_core::history::DEFAULT_WINDOW
}

impl SelectionConfig {
    /// Defaults for everything but the budget.
    pub fn with_budget(budget: f64) -> Self {
        Self {
            budget,
            formations: default_formations(),
            mode: DerivationMode::default(),
            include_doubtful: false,
            top_k: default_top_k(),
            local_search_cap: default_local_search_cap(),
            exact_state_limit: default_exact_state_limit(),
            history_window: default_history_window(),
            backup_policy: BackupPolicy::default(),
            adjustment: AdjustmentKind::default(),
            deadline_ms: 0,
            leader_multiplier: BTreeMap::new(),
            category_weight: BTreeMap::new(),
            premium: PremiumRule::default(),
            trap: TrapDetector::default(),
            custom_formations: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        for formation in self.formations()? {
            self.params_for(formation).validate()?;
        }
        Ok(())
    }

    /// Configured formations in order: custom definitions first, then presets.
    pub fn formations(&self) -> Result<Vec<Formation>, ConfigError> {
        let mut seen = BTreeSet::new();
        for custom in &self.custom_formations {
            if !seen.insert(custom.name.as_str()) {
                return Err(ConfigError::DuplicateFormation(custom.name.clone()));
            }
        }
        if self.formations.is_empty() {
            return Err(ConfigError::NoFormations);
        }
        self.formations
            .iter()
            .map(|name| {
                self.custom_formations
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| Formation::new(c.name.clone(), c.slots.iter().map(|(k, v)| (*k, *v))))
                    .or_else(|| Formation::preset(name))
                    .ok_or_else(|| ConfigError::UnknownFormation(name.clone()))
            })
            .collect()
    }

    pub fn params_for(&self, formation: Formation) -> SelectionParams {
        let mut leader_multiplier = default_leader_multiplier();
        leader_multiplier.extend(self.leader_multiplier.iter().map(|(k, v)| (*k, *v)));
        let mut category_weight = default_category_weight();
        category_weight.extend(self.category_weight.iter().map(|(k, v)| (*k, *v)));

        SelectionParams {
            allocation: AllocationParams {
                budget: self.budget,
                formation,
                top_k: self.top_k,
                local_search_cap: self.local_search_cap,
                exact_state_limit: self.exact_state_limit,
            },
            scoring: ScoringParams {
                mode: self.mode,
                category_weight,
                premium: self.premium.clone(),
            },
            finalize: FinalizeParams {
                leader_multiplier,
                backup_policy: self.backup_policy,
            },
            trap: self.trap,
            include_doubtful: self.include_doubtful,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }
}
