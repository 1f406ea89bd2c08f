use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::HttpMachineIdentifier;
use crate::domain::reconcile::reconcile_candidates;
use crate::domain::{
    DomainError, IdentificationConfig, IdentificationOutcome, MachineCatalog, OutcomeSource,
    PhotoRef,
};
use crate::ports::{MachineIdentifier, RemoteIdentification, RemoteKind};

/// Turns a photo into exactly one [`IdentificationOutcome`].
///
/// Holds no mutable state; one resolver can serve concurrent attempts.
pub struct IdentificationResolver {
    catalog: Arc<MachineCatalog>,
    identifier: Option<Arc<dyn MachineIdentifier>>,
    confidence_threshold: f64,
    request_timeout: Duration,
}

impl IdentificationResolver {
    /// Create a resolver around an explicit identifier.
    ///
    /// `None` runs offline: every attempt goes straight to the fallback.
    pub fn new(
        catalog: Arc<MachineCatalog>,
        identifier: Option<Arc<dyn MachineIdentifier>>,
        config: &IdentificationConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        info!(
            machines = catalog.len(),
            offline = identifier.is_none(),
            endpoint = %identifier.as_ref().map(|i| i.endpoint()).unwrap_or_default(),
            threshold = config.confidence_threshold,
            "IdentificationResolver initialized"
        );

        Ok(Self {
            catalog,
            identifier,
            confidence_threshold: config.confidence_threshold,
            request_timeout: config.request_timeout(),
        })
    }

    /// Create a resolver talking HTTP to the configured backend, or offline without one.
    pub fn from_config(
        catalog: Arc<MachineCatalog>,
        config: &IdentificationConfig,
    ) -> Result<Self, DomainError> {
        let identifier: Option<Arc<dyn MachineIdentifier>> = match config.base_url() {
            Some(base_url) => Some(Arc::new(HttpMachineIdentifier::new(
                base_url,
                config.request_timeout(),
            )?)),
            None => None,
        };
        Self::new(catalog, identifier, config)
    }

    pub fn is_offline(&self) -> bool {
        self.identifier.is_none()
    }

    pub fn catalog(&self) -> &MachineCatalog {
        &self.catalog
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Resolve a photo. Backend failures end in the offline fallback, never an error.
    pub async fn resolve(&self, photo: &PhotoRef) -> IdentificationOutcome {
        let Some(identifier) = self.identifier.as_ref() else {
            debug!(photo = %photo, "No backend configured, using offline fallback");
            return self.fallback(photo);
        };

        let attempt = tokio::time::timeout(self.request_timeout, identifier.identify(photo));
        let outcome = match attempt.await {
            Ok(Ok(remote)) => classify(&self.catalog, remote, self.confidence_threshold),
            Ok(Err(err)) => {
                if err.is_transport() {
                    warn!(
                        photo = %photo,
                        error = %err,
                        "Identification failed, using offline fallback"
                    );
                } else {
                    error!(
                        photo = %photo,
                        error = %err,
                        "Identifier error, using offline fallback"
                    );
                }
                self.fallback(photo)
            }
            Err(_) => {
                warn!(
                    photo = %photo,
                    timeout_secs = self.request_timeout.as_secs_f32(),
                    "Identification timed out, using offline fallback"
                );
                self.fallback(photo)
            }
        };

        info!(
            photo = %photo,
            kind = %outcome.kind(),
            machine_id = outcome.machine_id().unwrap_or_default(),
            confidence = outcome.confidence(),
            trace_id = outcome.trace_id().unwrap_or_default(),
            "Identification resolved"
        );
        outcome
    }

    /// Like [`resolve`](Self::resolve), but yields `None` once `cancel` fires.
    pub async fn resolve_cancellable(
        &self,
        photo: &PhotoRef,
        cancel: &CancellationToken,
    ) -> Option<IdentificationOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(photo = %photo, "Identification cancelled");
                None
            }
            outcome = self.resolve(photo) => Some(outcome),
        }
    }

    fn fallback(&self, photo: &PhotoRef) -> IdentificationOutcome {
        let machine = self.catalog.fallback_for(photo.as_str());
        IdentificationOutcome::fallback(machine.id.clone())
    }
}

/// Apply the threshold policy to a backend answer.
///
/// `generic` and `not_gym` answers keep their kind but ask the user to pick,
/// like a low-confidence match.
pub fn classify(
    catalog: &MachineCatalog,
    remote: RemoteIdentification,
    confidence_threshold: f64,
) -> IdentificationOutcome {
    let candidates = reconcile_candidates(catalog, &remote.candidates);
    let RemoteIdentification {
        kind,
        trace_id,
        mocked,
        ..
    } = remote;
    let source = OutcomeSource::BackendApi;

    match kind {
        RemoteKind::Generic => IdentificationOutcome::Generic {
            candidates,
            low_confidence: true,
            source,
            trace_id,
            mocked,
        },
        RemoteKind::NotGym => IdentificationOutcome::NotGym {
            candidates,
            low_confidence: true,
            source,
            trace_id,
            mocked,
        },
        RemoteKind::Match => match candidates.first() {
            Some(top) if top.confidence >= confidence_threshold => IdentificationOutcome::Catalog {
                machine_id: top.machine_id.clone(),
                confidence: top.confidence,
                candidates,
                source,
                trace_id,
                mocked,
            },
            _ => IdentificationOutcome::Manual {
                candidates,
                low_confidence: true,
                source,
                trace_id,
                mocked,
            },
        },
    }
}
