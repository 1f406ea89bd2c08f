pub mod config;
pub mod identifier;

pub use config::ConfigStore;
pub use identifier::{MachineIdentifier, RemoteIdentification, RemoteKind};
