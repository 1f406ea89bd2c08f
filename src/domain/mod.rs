pub mod catalog;
pub mod config;
pub mod error;
pub mod fallback;
pub mod identification;
pub mod machine;
pub mod reconcile;

pub use catalog::{MachineCatalog, MachinePage, MachineQuery};
pub use config::{AppConfig, IdentificationConfig};
pub use error::DomainError;
pub use identification::{
    IdentificationCandidate, IdentificationOutcome, OutcomeKind, OutcomeSource, PhotoRef,
};
pub use machine::{Category, Difficulty, MachineDefinition};
pub use reconcile::RemoteCandidate;
