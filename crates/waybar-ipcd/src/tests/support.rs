//! Daemon test world shared across lifecycle scenarios.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use waybar_ipc_config::{Config, SocketSettings};

use crate::methods::{MethodError, MethodRegistry, MethodResult, expect_arity};
use crate::process::launch::{LaunchPlan, run_daemon_with};
use crate::process::{LaunchError, ShutdownError, ShutdownSignal, StaticConfigLoader};
use crate::transport::test_utils::TestClient;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub type StepResult = Result<(), String>;

/// Shutdown signal released by [`TestShutdownSignal::trigger`].
#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn trigger(&self) {
        let (lock, condvar) = &*self.state;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, condvar) = &*self.state;
        let mut triggered = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            triggered = condvar
                .wait(triggered)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

/// Registry used by the scenarios: `echo` returns its arguments and `fail`
/// always reports an execution error.
pub fn scenario_registry() -> MethodRegistry {
    MethodRegistry::builder()
        .register("echo", |args: &[Value]| -> MethodResult {
            let mut body = Map::new();
            body.insert("success".to_owned(), json!(true));
            body.insert("args".to_owned(), Value::Array(args.to_vec()));
            Ok(body)
        })
        .and_then(|builder| {
            builder.register("fail", |args: &[Value]| -> MethodResult {
                expect_arity(args, 0)?;
                Err(MethodError::failed("always fails"))
            })
        })
        .expect("scenario registry")
        .build()
}

/// A daemon running on a background thread with its own socket directory.
pub struct DaemonWorld {
    _dir: TempDir,
    socket_path: Utf8PathBuf,
    shutdown: TestShutdownSignal,
    daemon: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    outcome: Option<Result<(), LaunchError>>,
    clients: Vec<TestClient>,
    last_response: Option<Value>,
}

impl DaemonWorld {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("socket directory");
        let socket_path = Utf8PathBuf::from_path_buf(dir.path().join("waybar-ipc.sock"))
            .expect("utf-8 socket path");
        Self {
            _dir: dir,
            socket_path,
            shutdown: TestShutdownSignal::default(),
            daemon: None,
            outcome: None,
            clients: Vec::new(),
            last_response: None,
        }
    }

    pub fn socket_path(&self) -> &Utf8PathBuf {
        &self.socket_path
    }

    pub fn start(&mut self) -> StepResult {
        if self.daemon.is_some() {
            return Err("daemon already running".to_owned());
        }
        let config = Config {
            socket: SocketSettings::new(self.socket_path.clone()),
            ..Config::default()
        };
        let shutdown = self.shutdown.clone();
        self.daemon = Some(thread::spawn(move || {
            run_daemon_with(LaunchPlan {
                loader: StaticConfigLoader::new(config),
                shutdown,
                registry: scenario_registry(),
            })
        }));
        self.wait_for(|world| world.socket_path.exists(), "socket file to appear")
    }

    /// Connects a client and confirms its session is being served.
    pub fn connect(&mut self) -> StepResult {
        let mut client = TestClient::connect(&self.socket_path);
        let reply = client.call(&json!({ "method": "echo", "args": ["ready"] }));
        if reply.get("success") != Some(&json!(true)) {
            return Err(format!("unexpected handshake reply: {reply}"));
        }
        self.clients.push(client);
        Ok(())
    }

    pub fn client(&mut self, index: usize) -> &mut TestClient {
        self.clients
            .get_mut(index)
            .unwrap_or_else(|| panic!("no client at index {index}"))
    }

    pub fn clients_mut(&mut self) -> &mut [TestClient] {
        &mut self.clients
    }

    pub fn record_response(&mut self, response: Value) {
        self.last_response = Some(response);
    }

    pub fn last_response(&self) -> Option<&Value> {
        self.last_response.as_ref()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Waits for the daemon thread and stores its result.
    pub fn join(&mut self) -> StepResult {
        let Some(handle) = self.daemon.take() else {
            return Err("daemon was never started".to_owned());
        };
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return Err("daemon did not exit in time".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        let outcome = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn outcome(&self) -> Option<&Result<(), LaunchError>> {
        self.outcome.as_ref()
    }

    fn wait_for(&self, condition: impl Fn(&Self) -> bool, what: &str) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !condition(self) {
            if Instant::now() >= deadline {
                return Err(format!("timed out waiting for {what}"));
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.daemon.take() {
            self.shutdown.trigger();
            drop(handle.join());
        }
    }
}
