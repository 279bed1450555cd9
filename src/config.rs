//! Startup configuration, loaded once and shared read-only.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::AccessError;

/// Shortest session the provider accepts and the default for every request.
pub const MIN_SESSION_DURATION_SECS: u32 = 900;
/// Longest session this crate will ever request.
pub const MAX_SESSION_DURATION_SECS: u32 = 3600;

static ACCOUNT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{12}$").unwrap());
static ORG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

/// Reject anything but a 12 digit account id.
pub fn validate_account_id(account: &str) -> Result<(), AccessError> {
    if account.is_empty() {
        return Err(AccessError::invalid_input("account id is empty".to_string()));
    }
    if !ACCOUNT_ID.is_match(account) {
        return Err(AccessError::invalid_input(format!(
            "account id '{account}' is not 12 digits"
        )));
    }
    Ok(())
}

/// The tag keys reserved by the system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagKeys {
    pub org: String,
    pub space: String,
    pub name: String,
    pub resource_name: String,
}

impl Default for TagKeys {
    fn default() -> Self {
        TagKeys {
            org: "spinup:org".to_string(),
            space: "spinup:spaceid".to_string(),
            name: "Name".to_string(),
            resource_name: "ResourceName".to_string(),
        }
    }
}

/// Bounded exponential backoff used while waiting on eventually
/// consistent provider state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        WaitConfig {
            max_attempts: 20,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl WaitConfig {
    /// Delay before retry number `attempt` (zero based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Everything the access core needs to know about its deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessConfig {
    pub org: String,
    pub role_name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "default_session_name_prefix")]
    pub session_name_prefix: String,
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u32,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub tag_keys: TagKeys,
    #[serde(default)]
    pub wait: WaitConfig,
}

fn default_session_name_prefix() -> String {
    "spinup".to_string()
}

fn default_session_duration() -> u32 {
    MIN_SESSION_DURATION_SECS
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl AccessConfig {
    /// Minimal configuration with defaults for everything optional.
    pub fn new(org: impl Into<String>, role_name: impl Into<String>) -> Self {
        AccessConfig {
            org: org.into(),
            role_name: role_name.into(),
            external_id: None,
            session_name_prefix: default_session_name_prefix(),
            session_duration_secs: default_session_duration(),
            region: default_region(),
            tag_keys: TagKeys::default(),
            wait: WaitConfig::default(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, AccessError> {
        let config: AccessConfig = serde_json::from_str(text)
            .map_err(|e| AccessError::invalid_input(format!("configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AccessError> {
        if !ORG_NAME.is_match(&self.org) {
            return Err(AccessError::invalid_input(format!(
                "org '{}' is empty or contains characters not allowed in a path",
                self.org
            )));
        }
        if self.role_name.trim().is_empty() {
            return Err(AccessError::invalid_input("role_name is empty".to_string()));
        }
        if self.session_name_prefix.is_empty() {
            return Err(AccessError::invalid_input(
                "session_name_prefix is empty".to_string(),
            ));
        }
        if self.wait.max_attempts == 0 {
            return Err(AccessError::invalid_input(
                "wait.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The external id to bind, if one is configured and non-empty.
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Configured session duration clamped to the allowed window.
    pub fn session_duration(&self) -> u32 {
        clamp_session_duration(Some(self.session_duration_secs))
    }
}

/// Clamp a requested duration into `[900, 3600]`; `None` means the default.
pub fn clamp_session_duration(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(MIN_SESSION_DURATION_SECS)
        .clamp(MIN_SESSION_DURATION_SECS, MAX_SESSION_DURATION_SECS)
}
