use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, PhotoRef, RemoteCandidate};

/// How the backend classified a photo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    /// Gym equipment; the candidates are machine labels.
    #[default]
    Match,
    /// Generic content that is not a specific machine.
    Generic,
    /// Not gym equipment at all.
    NotGym,
}

/// Successful answer from the identification backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteIdentification {
    pub kind: RemoteKind,
    /// Labels in the order the backend returned them.
    pub candidates: Vec<RemoteCandidate>,
    /// Server-side trace for looking up the raw model answer.
    pub trace_id: Option<String>,
    /// The backend answered with a placeholder prediction.
    pub mocked: bool,
}

impl RemoteIdentification {
    pub fn matched(candidates: Vec<RemoteCandidate>) -> Self {
        Self {
            kind: RemoteKind::Match,
            candidates,
            trace_id: None,
            mocked: false,
        }
    }
}

/// Port for the remote machine identification service.
///
/// Any `Err` is a recoverable transport condition from the caller's view:
/// network failure, non-2xx status, unreadable photo, or malformed body.
#[async_trait]
pub trait MachineIdentifier: Send + Sync {
    /// Identify the machine in a photo.
    async fn identify(&self, photo: &PhotoRef) -> Result<RemoteIdentification, DomainError>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> String;
}
