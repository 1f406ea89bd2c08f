use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{
    load_catalog, BackendHealth, HttpMachineIdentifier, TomlConfigStore, TraceDetails,
};
use crate::app::IdentificationResolver;
use crate::domain::config::process_env;
use crate::domain::{
    AppConfig, Category, Difficulty, DomainError, IdentificationOutcome, MachineCatalog,
    MachineDefinition, MachinePage, MachineQuery, PhotoRef,
};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, MachineIdentifier};

/// Everything derived from one configuration snapshot.
struct Services {
    catalog: Arc<MachineCatalog>,
    backend: Option<Arc<HttpMachineIdentifier>>,
    resolver: Arc<IdentificationResolver>,
}

impl Services {
    fn build(config: &AppConfig) -> Result<Self, DomainError> {
        config.validate()?;

        let catalog = Arc::new(load_catalog(config.catalog.path.as_deref())?);
        let identification = &config.identification;

        let backend = match identification.base_url() {
            Some(base_url) => Some(Arc::new(HttpMachineIdentifier::new(
                base_url,
                identification.request_timeout(),
            )?)),
            None => None,
        };

        let identifier = backend
            .clone()
            .map(|backend| backend as Arc<dyn MachineIdentifier>);
        let resolver = Arc::new(IdentificationResolver::new(
            Arc::clone(&catalog),
            identifier,
            identification,
        )?);

        Ok(Self {
            catalog,
            backend,
            resolver,
        })
    }
}

/// Application paths information.
#[derive(Debug, Clone, Serialize)]
pub struct AppPaths {
    pub data_dir: String,
    pub logs_dir: String,
    pub config_path: String,
}

/// Looks up one `MACHINEMATE_*` override by full variable name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Configuration as stored on disk, the overridden view in use, and what it built.
struct ControllerState {
    stored: AppConfig,
    effective: AppConfig,
    services: Services,
}

/// Application controller that owns configuration, the catalog and the resolver.
pub struct AppController {
    state: RwLock<ControllerState>,
    config_store: Arc<TomlConfigStore>,
    env: EnvLookup,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    ///
    /// `data_dir` replaces the OS application directory when given.
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self, DomainError> {
        Self::with_env(data_dir, Arc::new(process_env))
    }

    /// Like [`new`](Self::new), reading overrides from `env` instead of the process.
    pub fn with_env(data_dir: Option<PathBuf>, env: EnvLookup) -> Result<Self, DomainError> {
        // Step 1: Initialize config store
        let config_store = Arc::new(match data_dir {
            Some(dir) => TomlConfigStore::with_data_dir(dir)?,
            None => TomlConfigStore::new()?,
        });

        // Step 2: Load configuration, overrides stay in memory
        let stored = config_store.load()?;
        let effective = stored.effective(|key| env(key))?;

        // Step 3: Initialize logging
        let log_guard = init_logging(&config_store.logs_dir(), &effective.logging)?;

        info!(version = env!("CARGO_PKG_VERSION"), "MachineMate starting up");

        // Step 4: Catalog, backend client and resolver
        let services = Services::build(&effective)?;

        info!(
            machines = services.catalog.len(),
            offline = services.backend.is_none(),
            "AppController initialized"
        );

        Ok(Self {
            state: RwLock::new(ControllerState {
                stored,
                effective,
                services,
            }),
            config_store,
            env,
            _log_guard: log_guard,
        })
    }

    /// Configuration in use: the stored file with environment overrides applied.
    pub fn config(&self) -> AppConfig {
        self.state.read().effective.clone()
    }

    /// Configuration as written in the config file.
    pub fn stored_config(&self) -> AppConfig {
        self.state.read().stored.clone()
    }

    /// Persist a new stored configuration and apply it with overrides on top.
    ///
    /// Nothing changes when the result cannot be applied.
    pub fn update_config(&self, stored: AppConfig) -> Result<(), DomainError> {
        let effective = stored.effective(|key| (self.env)(key))?;
        let services = Services::build(&effective)?;

        self.config_store.save(&stored)?;

        *self.state.write() = ControllerState {
            stored,
            effective,
            services,
        };

        info!("Configuration updated");
        Ok(())
    }

    pub fn is_offline(&self) -> bool {
        self.state.read().services.backend.is_none()
    }

    fn resolver(&self) -> Arc<IdentificationResolver> {
        Arc::clone(&self.state.read().services.resolver)
    }

    fn catalog(&self) -> Arc<MachineCatalog> {
        Arc::clone(&self.state.read().services.catalog)
    }

    fn backend(&self) -> Result<Arc<HttpMachineIdentifier>, DomainError> {
        self.state.read().services.backend.clone().ok_or_else(|| {
            DomainError::Config(
                "No api_base_url configured, identification runs offline".to_string(),
            )
        })
    }

    /// Identify the machine in a photo.
    pub async fn identify(&self, photo: &str) -> Result<IdentificationOutcome, DomainError> {
        let photo = PhotoRef::new(photo)?;
        Ok(self.resolver().resolve(&photo).await)
    }

    /// Identify the machine in a photo; `Ok(None)` when `cancel` fires first.
    pub async fn identify_cancellable(
        &self,
        photo: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<IdentificationOutcome>, DomainError> {
        let photo = PhotoRef::new(photo)?;
        Ok(self.resolver().resolve_cancellable(&photo, cancel).await)
    }

    /// Get a machine definition by ID.
    pub fn machine(&self, machine_id: &str) -> Result<MachineDefinition, DomainError> {
        self.catalog().get(machine_id).cloned()
    }

    pub fn list_machines(
        &self,
        query: &MachineQuery,
        page: usize,
        page_size: usize,
    ) -> Result<MachinePage, DomainError> {
        self.catalog().list(query, page, page_size)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.catalog().categories()
    }

    pub fn difficulties(&self) -> Vec<Difficulty> {
        self.catalog().difficulties()
    }

    /// Query the identification backend's health endpoint.
    pub async fn health(&self) -> Result<BackendHealth, DomainError> {
        self.backend()?.health().await
    }

    /// Look up the backend's record of an identification by its trace id.
    pub async fn trace(&self, trace_id: &str) -> Result<TraceDetails, DomainError> {
        self.backend()?.trace(trace_id).await
    }

    pub fn paths(&self) -> AppPaths {
        AppPaths {
            data_dir: self.config_store.data_dir().to_string_lossy().to_string(),
            logs_dir: self.config_store.logs_dir().to_string_lossy().to_string(),
            config_path: self.config_store.config_path().to_string_lossy().to_string(),
        }
    }
}
