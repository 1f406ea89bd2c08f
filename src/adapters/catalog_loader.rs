use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::{DomainError, MachineCatalog};

/// Embedded machine catalog JSON.
const CATALOG_JSON: &str = include_str!("../../resources/machines.json");

/// Catalog shipped with the binary.
pub fn load_embedded_catalog() -> Result<MachineCatalog, DomainError> {
    let catalog = MachineCatalog::from_json(CATALOG_JSON)?;
    info!(machines = catalog.len(), "Embedded machine catalog loaded");
    Ok(catalog)
}

/// Catalog from a JSON file on disk.
pub fn load_catalog_file(path: &Path) -> Result<MachineCatalog, DomainError> {
    let content = fs::read_to_string(path)
        .map_err(|e| DomainError::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;
    let catalog = MachineCatalog::from_json(&content)?;
    info!(path = ?path, machines = catalog.len(), "Machine catalog loaded");
    Ok(catalog)
}

/// The configured catalog file, or the embedded one when none is set.
pub fn load_catalog(path: Option<&Path>) -> Result<MachineCatalog, DomainError> {
    match path {
        Some(path) => load_catalog_file(path),
        None => load_embedded_catalog(),
    }
}
