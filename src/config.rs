//! Engine configuration module
//! Handles dynamic configuration parameters for the room engine

use crate::constants::{
    DEFAULT_GRACE_PERIOD, DEFAULT_MAX_ROOMS, DEFAULT_REAP_TIMEOUT, DEFAULT_RPS_ROUNDS,
};
use crate::error::{ParlorError, Result};
use std::env;
use std::time::Duration;

/// Engine configuration parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a disconnected player keeps their seat before the drop
    /// counts as an explicit leave
    pub grace_period: Duration,
    /// How long a finished room may sit idle before being torn down
    pub reap_timeout: Duration,
    /// Maximum number of concurrently live rooms
    pub max_rooms: usize,
    /// Default best-of round count for Rock-Paper-Scissors matches
    pub rps_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            reap_timeout: DEFAULT_REAP_TIMEOUT,
            max_rooms: DEFAULT_MAX_ROOMS,
            rps_rounds: DEFAULT_RPS_ROUNDS,
        }
    }
}

impl EngineConfig {
    /// Create a test configuration with short timers
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            grace_period: Duration::from_millis(50),
            reap_timeout: Duration::from_millis(100),
            max_rooms: 16,
            rps_rounds: 3,
        }
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let grace_secs: u64 = env::var("PARLOR_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_GRACE_PERIOD.as_secs());

        if !(5..=600).contains(&grace_secs) {
            return Err(ParlorError::ConfigError(format!(
                "PARLOR_GRACE_SECS must be between 5 and 600, got {}",
                grace_secs
            )));
        }

        let reap_secs: u64 = env::var("PARLOR_REAP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REAP_TIMEOUT.as_secs());

        let max_rooms = env::var("PARLOR_MAX_ROOMS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROOMS);

        if max_rooms == 0 {
            return Err(ParlorError::ConfigError(
                "PARLOR_MAX_ROOMS must be greater than zero".to_string(),
            ));
        }

        let rps_rounds: u32 = env::var("PARLOR_RPS_ROUNDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RPS_ROUNDS);

        if rps_rounds % 2 == 0 || !(1..=25).contains(&rps_rounds) {
            return Err(ParlorError::ConfigError(format!(
                "PARLOR_RPS_ROUNDS must be odd and between 1 and 25, got {}",
                rps_rounds
            )));
        }

        Ok(Self {
            grace_period: Duration::from_secs(grace_secs),
            reap_timeout: Duration::from_secs(reap_secs),
            max_rooms,
            rps_rounds,
        })
    }
}
