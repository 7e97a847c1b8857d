use std::sync::LazyLock;
use std::time::Duration;

use spatial_bus::{RunOptions, TimeoutPolicy};

const WAIT_CEILING_VAR: &str = "SPATIAL_MEDIA_WAIT_CEILING_SECS";
const TIMEOUT_POLICY_VAR: &str = "SPATIAL_MEDIA_TIMEOUT_POLICY";

/// Process-wide defaults read once from the environment.
pub struct KitConfig {
    wait_ceiling: Duration,
    timeout_policy: TimeoutPolicy,
}

impl KitConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let wait_ceiling = match lookup(WAIT_CEILING_VAR).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                log::warn!("ignoring invalid {}, expected seconds > 0", WAIT_CEILING_VAR);
                RunOptions::DEFAULT_WAIT_CEILING
            }
            None => RunOptions::DEFAULT_WAIT_CEILING,
        };
        let timeout_policy = match lookup(TIMEOUT_POLICY_VAR).map(|v| v.trim().parse()) {
            Some(Ok(policy)) => policy,
            Some(Err(e)) => {
                log::warn!("ignoring {}: {}", TIMEOUT_POLICY_VAR, e);
                TimeoutPolicy::default()
            }
            None => TimeoutPolicy::default(),
        };
        Self {
            wait_ceiling,
            timeout_policy,
        }
    }

    pub fn wait_ceiling(&self) -> Duration {
        self.wait_ceiling
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions::new()
            .wait_ceiling(self.wait_ceiling)
            .timeout_policy(self.timeout_policy)
    }
}

pub fn config() -> &'static KitConfig {
    static CONFIG: LazyLock<KitConfig> =
        LazyLock::new(|| KitConfig::from_lookup(|key| std::env::var(key).ok()));
    &CONFIG
}
