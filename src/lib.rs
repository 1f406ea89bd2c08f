#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{AppController, IdentificationResolver};
pub use domain::{
    DomainError, IdentificationCandidate, IdentificationConfig, IdentificationOutcome,
    MachineCatalog, MachineDefinition, OutcomeKind, OutcomeSource, PhotoRef,
};
pub use ports::{MachineIdentifier, RemoteIdentification, RemoteKind};
