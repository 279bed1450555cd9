use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants, EnumString};
use thiserror::Error;
use tracing::debug;

/// An error as reported by a remote provider (identity provider, credential
/// service or registry), identified by its documented error code.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, EnumDiscriminants)]
#[strum_discriminants(name(ErrorKind), derive(EnumString, Display, Hash))]
pub enum AccessError {
    #[error("invalid input: {context}")]
    InvalidInput {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("not found: {context}")]
    NotFound {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("conflict: {context}")]
    Conflict {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("forbidden: {context}")]
    Forbidden {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("throttled: {context}")]
    Throttled {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("limit exceeded: {context}")]
    LimitExceeded {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },

    #[error("malformed policy document: {0}")]
    MalformedDocument(String),

    #[error("internal error: {context}")]
    Internal {
        context: String,
        #[source]
        cause: Option<ProviderError>,
    },
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }

    /// Whether a caller-level backoff may succeed. The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccessError::Throttled { .. } | AccessError::LimitExceeded { .. }
        )
    }

    pub fn invalid_input(context: impl Into<String>) -> Self {
        AccessError::InvalidInput {
            context: context.into(),
            cause: None,
        }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        AccessError::NotFound {
            context: context.into(),
            cause: None,
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        AccessError::Internal {
            context: context.into(),
            cause: None,
        }
    }

    /// The raw provider error this error was classified from, if any.
    pub fn cause(&self) -> Option<&ProviderError> {
        match self {
            AccessError::InvalidInput { cause, .. }
            | AccessError::NotFound { cause, .. }
            | AccessError::Conflict { cause, .. }
            | AccessError::Forbidden { cause, .. }
            | AccessError::Throttled { cause, .. }
            | AccessError::LimitExceeded { cause, .. }
            | AccessError::Internal { cause, .. } => cause.as_ref(),
            AccessError::MalformedDocument(_) => None,
        }
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::MalformedDocument(err.to_string())
    }
}

/// Map a provider error onto the error taxonomy, keeping the provider error
/// as the cause. `context` names the operation and the resource it acted on.
pub fn classify(context: impl Into<String>, err: ProviderError) -> AccessError {
    let context = context.into();
    debug!(
        event = "Classify",
        context = context.as_str(),
        code = err.code.as_str(),
        message = err.message.as_str()
    );

    match err.code.as_str() {
        "AccessDenied"
        | "AccessDeniedException"
        | "UnauthorizedOperation"
        | "ExpiredToken"
        | "ExpiredTokenException"
        | "InvalidClientTokenId"
        | "RegionDisabledException" => AccessError::Forbidden {
            context,
            cause: Some(err),
        },
        "NoSuchEntity"
        | "RepositoryNotFoundException"
        | "RepositoryPolicyNotFoundException"
        | "ImageNotFoundException"
        | "LayersNotFoundException"
        | "LifecyclePolicyNotFoundException"
        | "LifecyclePolicyPreviewNotFoundException"
        | "ReferencedImagesNotFoundException"
        | "ScanNotFoundException"
        | "UploadNotFoundException" => AccessError::NotFound {
            context,
            cause: Some(err),
        },
        "EntityAlreadyExists"
        | "ConcurrentModification"
        | "DeleteConflict"
        | "RepositoryAlreadyExistsException"
        | "ImageAlreadyExistsException"
        | "ImageTagAlreadyExistsException"
        | "LayerAlreadyExistsException"
        | "LifecyclePolicyPreviewInProgressException" => AccessError::Conflict {
            context,
            cause: Some(err),
        },
        "Throttling" | "ThrottlingException" | "TooManyRequestsException"
        | "RequestLimitExceeded" => AccessError::Throttled {
            context,
            cause: Some(err),
        },
        "LimitExceeded" | "LimitExceededException" | "TooManyTagsException" => {
            AccessError::LimitExceeded {
                context,
                cause: Some(err),
            }
        }
        "InvalidInput"
        | "ValidationError"
        | "MalformedPolicyDocument"
        | "PackedPolicyTooLarge"
        | "InvalidParameterException"
        | "InvalidParameterValue"
        | "InvalidTagParameterException"
        | "RepositoryNotEmptyException"
        | "InvalidLayerException"
        | "InvalidLayerPartException"
        | "EmptyUploadException"
        | "ImageDigestDoesNotMatchException"
        | "LayerInaccessibleException"
        | "LayerPartTooSmallException"
        | "UnsupportedImageTypeException" => AccessError::InvalidInput {
            context,
            cause: Some(err),
        },
        _ => AccessError::Internal {
            context,
            cause: Some(err),
        },
    }
}
