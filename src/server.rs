//! Worker process lifecycle: launch, readiness, teardown
//!
//! The serving process under test is an external collaborator. This module
//! builds its launch command, spawns it, polls the health endpoint until it
//! accepts load, and tears it down at sweep end. None of the load-testing
//! core depends on how the server is started.
//!
//! Also provides the idempotent pre-run cleanup that kills stray serving
//! processes left over from a previous run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::client::GenerateClient;
use crate::error::{CargaError, Result};

/// Settle time after killing stray processes
const CLEANUP_SETTLE: Duration = Duration::from_secs(2);

/// How the serving process is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Single worker, no router in front
    Worker,
    /// Router fronting `dp_size` data-parallel workers
    Router {
        /// Number of data-parallel workers behind the router
        dp_size: usize,
    },
}

impl LaunchMode {
    /// Mode label recorded in the sweep report
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Router { .. } => "router",
        }
    }
}

/// Launch configuration for the serving process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Python interpreter used to launch the server module
    pub python_bin: String,
    /// Model path or identifier passed to the server
    pub model_path: String,
    /// Bind host for the server
    pub host: String,
    /// Bind port for the server
    pub port: u16,
    /// Worker vs router launch
    pub mode: LaunchMode,
    /// `--max-total-tokens` passed to the worker
    pub max_total_tokens: u32,
    /// `--mem-fraction-static` passed to the worker
    pub mem_fraction_static: f64,
    /// Whether to pass `--disable-radix-cache`
    pub disable_radix_cache: bool,
    /// `--max-running-requests` passed to the worker
    pub max_running_requests: u32,
    /// Seconds to wait for the health endpoint before giving up
    pub ready_timeout_secs: u64,
    /// Seconds between readiness probes
    pub ready_poll_interval_secs: u64,
    /// Full argv override, used by tests to stand in for the real server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_override: Option<Vec<String>>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            model_path: "qwen/qwen2.5-0.5b-instruct".to_string(),
            host: "0.0.0.0".to_string(),
            port: 31000,
            mode: LaunchMode::Worker,
            max_total_tokens: 10_000,
            mem_fraction_static: 0.9,
            disable_radix_cache: true,
            max_running_requests: 1024,
            ready_timeout_secs: 60,
            ready_poll_interval_secs: 2,
            command_override: None,
        }
    }
}

impl WorkerConfig {
    /// Base URL the harness talks to; always loopback regardless of the
    /// bind host
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Generation endpoint URL
    #[must_use]
    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url())
    }

    /// Full launch argv, starting with the program
    #[must_use]
    pub fn launch_command(&self) -> Vec<String> {
        if let Some(ref argv) = self.command_override {
            return argv.clone();
        }

        let module = match self.mode {
            LaunchMode::Worker => "sglang.launch_server",
            LaunchMode::Router { .. } => "sglang_router.launch_server",
        };

        let mut argv = vec![
            self.python_bin.clone(),
            "-m".to_string(),
            module.to_string(),
            "--model-path".to_string(),
            self.model_path.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ];

        if let LaunchMode::Router { dp_size } = self.mode {
            argv.push("--dp-size".to_string());
            argv.push(dp_size.to_string());
        }

        argv.push("--max-total-tokens".to_string());
        argv.push(self.max_total_tokens.to_string());
        argv.push("--mem-fraction-static".to_string());
        argv.push(self.mem_fraction_static.to_string());
        if self.disable_radix_cache {
            argv.push("--disable-radix-cache".to_string());
        }
        argv.push("--max-running-requests".to_string());
        argv.push(self.max_running_requests.to_string());

        argv
    }
}

/// Handle to a launched serving process
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
}

/// Launches the serving process and polls it to readiness
#[derive(Debug)]
pub struct WorkerSupervisor {
    config: WorkerConfig,
    client: GenerateClient,
}

impl WorkerSupervisor {
    /// Create a supervisor for the given launch configuration
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            client: GenerateClient::new(),
        }
    }

    /// Launch configuration this supervisor runs with
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Spawn the serving process and wait until its health endpoint
    /// answers 200
    ///
    /// # Errors
    /// Returns `LaunchFailed` if the process cannot be spawned, or
    /// `WorkerNotReady` (with the child killed) if the readiness window
    /// elapses first
    pub async fn start(&self) -> Result<WorkerHandle> {
        let argv = self.config.launch_command();
        if argv.is_empty() {
            return Err(CargaError::InvalidConfiguration(
                "empty launch command".to_string(),
            ));
        }

        println!("Launching worker: {}", argv.join(" "));
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CargaError::LaunchFailed {
                reason: format!("{}: {e}", argv[0]),
            })?;
        let mut handle = WorkerHandle { child };

        let base_url = self.config.base_url();
        let deadline =
            Instant::now() + Duration::from_secs(self.config.ready_timeout_secs);
        loop {
            if self.client.check_health(&base_url).await {
                println!("Worker ready on port {}", self.config.port);
                return Ok(handle);
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_secs(self.config.ready_poll_interval_secs))
                .await;
        }

        let _ = handle.child.kill().await;
        Err(CargaError::WorkerNotReady {
            url: base_url,
            waited_secs: self.config.ready_timeout_secs,
        })
    }

    /// One-shot readiness probe against the configured endpoint
    pub async fn is_ready(&self) -> bool {
        self.client.check_health(&self.config.base_url()).await
    }

    /// Terminate the serving process and wait for it to exit
    ///
    /// # Errors
    /// Returns `IoError` if waiting on the child fails
    pub async fn stop(&self, mut handle: WorkerHandle) -> Result<()> {
        println!("Shutting down worker...");
        handle.child.kill().await.map_err(|e| CargaError::IoError {
            message: format!("Failed to stop worker: {e}"),
        })?;
        Ok(())
    }
}

/// Kill stray serving processes whose command line matches `name_filter`
///
/// Idempotent pre-run step; a clean system is left untouched. Returns the
/// PIDs that were killed. Sleeps briefly when anything was killed so the
/// ports they held are released before the next launch.
pub fn kill_stray_workers(name_filter: &str) -> Vec<u32> {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
    );

    let own_pid = std::process::id();
    let mut killed = Vec::new();
    for (pid, process) in system.processes() {
        if pid.as_u32() == own_pid {
            continue;
        }
        let matches = process
            .cmd()
            .iter()
            .any(|arg| arg.to_string_lossy().contains(name_filter));
        if matches && process.kill() {
            killed.push(pid.as_u32());
        }
    }

    if !killed.is_empty() {
        println!("Killed existing {name_filter} processes: {killed:?}");
        std::thread::sleep(CLEANUP_SETTLE);
    }
    killed
}
