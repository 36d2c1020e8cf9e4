//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use waybar_ipc_config::{Config, ConfigError};

use crate::dispatch::Dispatcher;
use crate::methods::{MethodRegistry, default_registry};
use crate::telemetry;
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader that always yields the same configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) shutdown: S,
    pub(crate) registry: MethodRegistry,
}

/// Runs the daemon using the production collaborators.
///
/// Blocks until SIGTERM, SIGINT, SIGQUIT or SIGHUP arrives, then disconnects
/// every client and removes the socket file.
pub fn run_daemon() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    let registry = default_registry()?;
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown,
        registry,
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        shutdown,
        registry,
    } = plan;

    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.socket(),
        mode = %config.socket().mode(),
        methods = ?registry.names(),
        "starting daemon runtime"
    );

    config.socket().prepare_filesystem()?;
    let listener = SocketListener::bind(config.socket())?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));
    let server = listener.start(dispatcher)?;

    let waited = shutdown.wait();
    server.shutdown();
    let torn_down = server.teardown();
    waited?;
    torn_down?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
