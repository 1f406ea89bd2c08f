//! Identification request and outcome types shared by the resolver and its callers.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::DomainError;

/// Reference to a captured or selected photo (a `file://` URI or a path).
///
/// Never empty: construction is the boundary where a missing photo is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhotoRef(String);

impl PhotoRef {
    pub fn new(reference: impl Into<String>) -> Result<Self, DomainError> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(DomainError::Precondition(
                "A photo reference is required to identify a machine".to_string(),
            ));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local filesystem path the reference points at.
    pub fn to_path(&self) -> PathBuf {
        match Url::parse(&self.0) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .unwrap_or_else(|_| PathBuf::from(url.path())),
            _ => PathBuf::from(&self.0),
        }
    }

    /// File name used when uploading the photo.
    pub fn file_name(&self) -> String {
        self.to_path()
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("photo.jpg")
            .to_string()
    }

    /// Image MIME type guessed from the extension, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        let extension = self
            .to_path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            Some("heif") => "image/heif",
            Some("gif") => "image/gif",
            _ => "image/jpeg",
        }
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog machine proposed for a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationCandidate {
    pub machine_id: String,
    /// Score in [0, 1].
    pub confidence: f64,
}

impl IdentificationCandidate {
    pub fn new(machine_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            machine_id: machine_id.into(),
            confidence,
        }
    }
}

/// Where an outcome's suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    BackendApi,
    Fallback,
}

/// Discriminant of [`IdentificationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Catalog,
    Manual,
    Fallback,
    Generic,
    NotGym,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeKind::Catalog => "catalog",
            OutcomeKind::Manual => "manual",
            OutcomeKind::Fallback => "fallback",
            OutcomeKind::Generic => "generic",
            OutcomeKind::NotGym => "not_gym",
        };
        write!(f, "{}", name)
    }
}

/// Normalized result of one identification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentificationOutcome {
    /// Top candidate cleared the threshold; the caller can open its guide directly.
    #[serde(rename_all = "camelCase")]
    Catalog {
        machine_id: String,
        confidence: f64,
        candidates: Vec<IdentificationCandidate>,
        source: OutcomeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
        #[serde(default)]
        mocked: bool,
    },
    /// The user has to pick from the candidates (possibly none).
    #[serde(rename_all = "camelCase")]
    Manual {
        candidates: Vec<IdentificationCandidate>,
        low_confidence: bool,
        source: OutcomeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
        #[serde(default)]
        mocked: bool,
    },
    /// Backend unavailable; a deterministic guess from the photo reference.
    #[serde(rename_all = "camelCase")]
    Fallback {
        machine_id: String,
        confidence: Option<f64>,
        candidates: Vec<String>,
        source: OutcomeSource,
    },
    /// Photo shows generic content. Handled like `Manual` for now.
    #[serde(rename_all = "camelCase")]
    Generic {
        candidates: Vec<IdentificationCandidate>,
        low_confidence: bool,
        source: OutcomeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
        #[serde(default)]
        mocked: bool,
    },
    /// Photo is not of gym equipment. Handled like `Manual` for now.
    #[serde(rename_all = "camelCase")]
    NotGym {
        candidates: Vec<IdentificationCandidate>,
        low_confidence: bool,
        source: OutcomeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
        #[serde(default)]
        mocked: bool,
    },
}

impl IdentificationOutcome {
    pub(crate) fn fallback(machine_id: String) -> Self {
        IdentificationOutcome::Fallback {
            candidates: vec![machine_id.clone()],
            machine_id,
            confidence: None,
            source: OutcomeSource::Fallback,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            IdentificationOutcome::Catalog { .. } => OutcomeKind::Catalog,
            IdentificationOutcome::Manual { .. } => OutcomeKind::Manual,
            IdentificationOutcome::Fallback { .. } => OutcomeKind::Fallback,
            IdentificationOutcome::Generic { .. } => OutcomeKind::Generic,
            IdentificationOutcome::NotGym { .. } => OutcomeKind::NotGym,
        }
    }

    pub fn source(&self) -> OutcomeSource {
        match self {
            IdentificationOutcome::Catalog { source, .. }
            | IdentificationOutcome::Manual { source, .. }
            | IdentificationOutcome::Fallback { source, .. }
            | IdentificationOutcome::Generic { source, .. }
            | IdentificationOutcome::NotGym { source, .. } => *source,
        }
    }

    /// The single suggested machine, for outcomes that carry one.
    pub fn machine_id(&self) -> Option<&str> {
        match self {
            IdentificationOutcome::Catalog { machine_id, .. }
            | IdentificationOutcome::Fallback { machine_id, .. } => Some(machine_id),
            _ => None,
        }
    }

    /// Confidence of the suggested machine; `None` for fallbacks and manual picks.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            IdentificationOutcome::Catalog { confidence, .. } => Some(*confidence),
            IdentificationOutcome::Fallback { confidence, .. } => *confidence,
            _ => None,
        }
    }

    /// Candidate machine ids in presentation order.
    pub fn candidate_ids(&self) -> Vec<&str> {
        match self {
            IdentificationOutcome::Fallback { candidates, .. } => {
                candidates.iter().map(String::as_str).collect()
            }
            IdentificationOutcome::Catalog { candidates, .. }
            | IdentificationOutcome::Manual { candidates, .. }
            | IdentificationOutcome::Generic { candidates, .. }
            | IdentificationOutcome::NotGym { candidates, .. } => {
                candidates.iter().map(|c| c.machine_id.as_str()).collect()
            }
        }
    }

    /// Whether the caller should show the disambiguation picker.
    pub fn needs_disambiguation(&self) -> bool {
        matches!(
            self,
            IdentificationOutcome::Manual { .. }
                | IdentificationOutcome::Generic { .. }
                | IdentificationOutcome::NotGym { .. }
        )
    }

    pub fn trace_id(&self) -> Option<&str> {
        match self {
            IdentificationOutcome::Catalog { trace_id, .. }
            | IdentificationOutcome::Manual { trace_id, .. }
            | IdentificationOutcome::Generic { trace_id, .. }
            | IdentificationOutcome::NotGym { trace_id, .. } => trace_id.as_deref(),
            IdentificationOutcome::Fallback { .. } => None,
        }
    }
}
