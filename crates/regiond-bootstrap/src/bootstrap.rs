//! Coordinator bootstrap: configuration, telemetry and artefact layout.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use regiond_config::{BootstrapLayout, Config, LayoutError};
use thiserror::Error;

use crate::health::HealthReporter;
use crate::sequence::{SequenceSettings, SettingsError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the coordinator configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads defaults, file, environment and process arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced before coordination starts.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The configured roots do not form a usable layout.
    #[error("invalid bootstrap layout: {source}")]
    Layout {
        /// Layout validation error.
        #[source]
        source: LayoutError,
    },
    /// The database names or poll interval are unusable.
    #[error("invalid sequence settings: {source}")]
    Settings {
        /// Settings validation error.
        #[source]
        source: SettingsError,
    },
}

/// Everything the coordinator needs once bootstrap succeeds.
#[derive(Debug)]
pub struct Bootstrap {
    config: Config,
    layout: BootstrapLayout,
    settings: SequenceSettings,
    telemetry: TelemetryHandle,
}

impl Bootstrap {
    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Derived artefact paths.
    #[must_use]
    pub const fn layout(&self) -> &BootstrapLayout {
        &self.layout
    }

    /// Validated leader sequence settings.
    #[must_use]
    pub const fn settings(&self) -> &SequenceSettings {
        &self.settings
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Loads configuration, installs telemetry and derives the layout.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the first stage that failed; the
/// reporter observes the same error before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Bootstrap, BootstrapError> {
    let result = prepare(loader);
    match &result {
        Ok(bootstrap) => reporter.bootstrap_succeeded(&bootstrap.config),
        Err(error) => reporter.bootstrap_failed(error),
    }
    result
}

fn prepare(loader: &dyn ConfigLoader) -> Result<Bootstrap, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let layout =
        BootstrapLayout::from_config(&config).map_err(|source| BootstrapError::Layout { source })?;
    let settings =
        SequenceSettings::from_config(&config).map_err(|source| BootstrapError::Settings { source })?;
    Ok(Bootstrap {
        config,
        layout,
        settings,
        telemetry,
    })
}
