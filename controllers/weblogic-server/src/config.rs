//! Controller configuration.
//!
//! Read once from the environment at startup.

use crate::error::ControllerError;
use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_RESYNC_SECS: u64 = 30;
const DEFAULT_STATUS_RETRIES: u32 = 5;
const DEFAULT_IMAGE: &str = "store/oracle/weblogic";

/// Runtime settings for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace whose servers and StatefulSets are watched
    pub namespace: String,
    /// Interval between resync passes; `None` disables resync
    pub resync_period: Option<Duration>,
    /// Attempts for a conditional write before a conflict is surfaced
    pub status_update_max_retries: u32,
    /// Image repository; the tag is the server's version
    pub image: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            resync_period: Some(Duration::from_secs(DEFAULT_RESYNC_SECS)),
            status_update_max_retries: DEFAULT_STATUS_RETRIES,
            image: DEFAULT_IMAGE.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let namespace = lookup("WATCH_NAMESPACE")
            .filter(|ns| !ns.is_empty())
            .unwrap_or(defaults.namespace);

        let resync_period = match lookup("RESYNC_PERIOD_SECS") {
            Some(raw) => match parse_number::<u64>("RESYNC_PERIOD_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.resync_period,
        };

        let status_update_max_retries = match lookup("STATUS_UPDATE_MAX_RETRIES") {
            Some(raw) => parse_number::<u32>("STATUS_UPDATE_MAX_RETRIES", &raw)?,
            None => defaults.status_update_max_retries,
        };
        if status_update_max_retries == 0 {
            return Err(ControllerError::InvalidConfig(
                "STATUS_UPDATE_MAX_RETRIES must be at least 1".to_string(),
            ));
        }

        let image = lookup("WEBLOGIC_IMAGE")
            .filter(|image| !image.is_empty())
            .unwrap_or(defaults.image);

        Ok(Self {
            namespace,
            resync_period,
            status_update_max_retries,
            image,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ControllerError> {
    raw.trim().parse::<T>().map_err(|_| {
        ControllerError::InvalidConfig(format!(
            "{} must be a non-negative integer, got {:?}",
            key, raw
        ))
    })
}
