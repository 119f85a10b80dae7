use std::path::PathBuf;

use thiserror::Error;

use crate::context::ContextId;
use crate::value::HostRef;

/// Errors raised by host collaborators
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0}")]
    Failed(String),
    #[error("unknown host function '{0}'")]
    UnknownFunction(String),
    #[error("invalid host reference {0:?}")]
    InvalidReference(HostRef),
    #[error("Asset type '{0}' does not exist")]
    UnknownAssetType(String),
    #[error("Invalid DVAR name '{0}', must be alphanumeric")]
    InvalidDvarName(String),
    #[error("Not in game")]
    NotInGame,
}

/// Errors crossing the host/script value bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no converted function registered for {0:?}")]
    UnknownFunction(HostRef),
    #[error("context {0} is no longer alive")]
    ContextGone(ContextId),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("script error: {0}")]
    Script(#[from] mlua::Error),
}

/// Errors raised while constructing a script context
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("script package {0} has no entry script")]
    MissingEntry(PathBuf),
    #[error("{0}")]
    Script(#[from] mlua::Error),
}

impl From<HostError> for mlua::Error {
    fn from(err: HostError) -> Self {
        mlua::Error::RuntimeError(err.to_string())
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Script(inner) => inner,
            other => mlua::Error::RuntimeError(other.to_string()),
        }
    }
}
