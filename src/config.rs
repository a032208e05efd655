use std::time::Duration;

use anyhow::Context;

use crate::converter::SimulatedConverter;
use crate::notify::Notifier;

/// Runtime knobs, read from the environment (and `.env`, when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub simulated_delay: Duration,
    pub toast_lifetime: Duration,
    pub toast_exit_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulated_delay: SimulatedConverter::DEFAULT_DELAY,
            toast_lifetime: Notifier::DEFAULT_LIFETIME,
            toast_exit_delay: Notifier::DEFAULT_EXIT_DELAY,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            simulated_delay: millis(&lookup, "FLIP_SIMULATED_DELAY_MS", defaults.simulated_delay)?,
            toast_lifetime: millis(&lookup, "FLIP_TOAST_DURATION_MS", defaults.toast_lifetime)?,
            toast_exit_delay: millis(&lookup, "FLIP_TOAST_EXIT_MS", defaults.toast_exit_delay)?,
        })
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("{} must be a number of milliseconds, got {:?}", key, raw);
    }
    let ms = raw
        .parse::<u64>()
        .with_context(|| format!("{} is out of range", key))?;
    Ok(Duration::from_millis(ms))
}
