use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Port for reading and writing the MachineMate configuration file.
pub trait ConfigStore: Send + Sync {
    /// Read the stored configuration, writing defaults first if the file is missing.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Write the configuration back to disk.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;
}
