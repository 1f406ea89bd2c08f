pub mod catalog_loader;
pub mod config_store;
pub mod http_identifier;

pub use catalog_loader::{load_catalog, load_catalog_file, load_embedded_catalog};
pub use config_store::TomlConfigStore;
pub use http_identifier::{BackendHealth, HttpMachineIdentifier, TraceDetails};
