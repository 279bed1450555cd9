//! Temporary credentials and the session handle wrapping them.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived credentials returned by an assume-role call.
///
/// Owned by the operation that requested them and never cached. The
/// expiration is advisory: the provider enforces it and nothing here
/// refreshes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl TemporaryCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}

impl Debug for TemporaryCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TemporaryCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Everything a downstream client needs for one operation in one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedSession {
    pub credential: TemporaryCredential,
    pub region: String,
    pub role_arn: String,
    pub session_name: String,
}
