//! Worker pool and classifier configuration

use crate::shardline::error::ConfigError;
use crate::shardline::store::DEFAULT_RECORD_TTL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of processing workers
    #[serde(default = "default_routines")]
    pub routines: usize,

    /// Time to live applied to stored records
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_routines() -> usize {
    12
}

fn default_ttl_secs() -> u64 {
    DEFAULT_RECORD_TTL.as_secs()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            routines: default_routines(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn with_routines(mut self, routines: usize) -> Self {
        self.routines = routines;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routines == 0 {
            return Err(ConfigError::invalid("worker.routines", "must be at least 1"));
        }
        if self.ttl_secs == 0 {
            return Err(ConfigError::invalid("worker.ttl_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Business thresholds for the transmit classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_required_event")]
    pub required_event: i64,

    /// Follower count must be strictly greater than this
    #[serde(default = "default_min_followers")]
    pub min_followers: i64,

    /// Inclusive `[low, high]` state ranges that are ignored
    #[serde(default = "default_excluded_states")]
    pub excluded_states: Vec<[i64; 2]>,

    #[serde(default = "default_key_suffix")]
    pub key_suffix: String,
}

fn default_required_event() -> i64 {
    2
}

fn default_min_followers() -> i64 {
    150
}

fn default_excluded_states() -> Vec<[i64; 2]> {
    vec![
        [3, 3],
        [5, 11],
        [16, 17],
        [20, 20],
        [25, 34],
        [36, 36],
        [41, 42],
    ]
}

fn default_key_suffix() -> String {
    "_transmit_new".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            required_event: default_required_event(),
            min_followers: default_min_followers(),
            excluded_states: default_excluded_states(),
            key_suffix: default_key_suffix(),
        }
    }
}

impl ClassifierConfig {
    pub fn is_excluded_state(&self, state: i64) -> bool {
        self.excluded_states
            .iter()
            .any(|&[low, high]| (low..=high).contains(&state))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, [low, high]) in self.excluded_states.iter().enumerate() {
            if low > high {
                return Err(ConfigError::invalid(
                    format!("classifier.excluded_states[{}]", i),
                    format!("range start {} is after end {}", low, high),
                ));
            }
        }
        if self.key_suffix.is_empty() {
            return Err(ConfigError::invalid("classifier.key_suffix", "must not be empty"));
        }
        Ok(())
    }
}
