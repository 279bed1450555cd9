use std::sync::Arc;

use tracing::info;

use crate::assume_role::{AssumeRoleRequest, assume_scoped};
use crate::config::AccessConfig;
use crate::error::AccessError;
use crate::scope::{CredentialScope, Operation};
use crate::traits::CredentialProvider;
use crate::types::{ScopedSession, Tag};

/// Hands out one freshly scoped session per operation.
///
/// Cheap to clone; clones share the provider and the configuration but
/// never a credential.
#[derive(Clone)]
pub struct SessionBroker {
    provider: Arc<dyn CredentialProvider>,
    config: Arc<AccessConfig>,
}

impl SessionBroker {
    pub fn new(provider: Arc<dyn CredentialProvider>, config: Arc<AccessConfig>) -> Self {
        SessionBroker { provider, config }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// The assume-role request `operation` in `account` would send.
    pub fn request_for(
        &self,
        account: &str,
        operation: Operation,
        tags: Vec<Tag>,
    ) -> Result<AssumeRoleRequest, AccessError> {
        let builder = AssumeRoleRequest::for_account(&self.config, account)?.tags(tags);
        CredentialScope::for_operation(operation, &self.config)
            .apply(builder)?
            .build()
    }

    /// Assume the cross-account role in `account`, narrowed to `operation`.
    pub async fn session_for(
        &self,
        account: &str,
        operation: Operation,
    ) -> Result<ScopedSession, AccessError> {
        self.session_with_tags(account, operation, Vec::new()).await
    }

    /// As [`SessionBroker::session_for`], with extra session tags. The
    /// tenant org tag is always set by the broker.
    pub async fn session_with_tags(
        &self,
        account: &str,
        operation: Operation,
        tags: Vec<Tag>,
    ) -> Result<ScopedSession, AccessError> {
        info!(event = "Session", phase = "Request", account, %operation);
        let request = self.request_for(account, operation, tags)?;
        assume_scoped(self.provider.as_ref(), &request, &self.config.region).await
    }
}
