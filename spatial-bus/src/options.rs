use std::str::FromStr;
use std::time::Duration;

/// What happens when track discovery or the drain exceed the wait ceiling.
/// Finalize overruns are always an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    #[default]
    Strict,
    /// Log and carry on with whatever state was reached.
    Lenient,
}

impl FromStr for TimeoutPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(TimeoutPolicy::Strict),
            "lenient" => Ok(TimeoutPolicy::Lenient),
            other => anyhow::bail!("unknown timeout policy {:?}", other),
        }
    }
}

/// Per-run knobs shared by every pipeline.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub wait_ceiling: Duration,
    pub timeout_policy: TimeoutPolicy,
    pub ready_poll_interval: Duration,
    pub remove_partial_output: bool,
}

impl RunOptions {
    pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_secs(60 * 60 * 24);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_ceiling(mut self, ceiling: Duration) -> Self {
        self.wait_ceiling = ceiling;
        self
    }

    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    pub fn ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    pub fn remove_partial_output(mut self, remove: bool) -> Self {
        self.remove_partial_output = remove;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait_ceiling: Self::DEFAULT_WAIT_CEILING,
            timeout_policy: TimeoutPolicy::Strict,
            ready_poll_interval: Duration::from_millis(1),
            remove_partial_output: false,
        }
    }
}
