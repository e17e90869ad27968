//! Identity rotation capability
//!
//! When backoff alone cannot clear a per-origin throttle, the orchestrator
//! may ask for a fresh egress identity. It only ever talks to the
//! [`IdentityRotator`] trait; which tool performs the switch is a deployment
//! concern.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Something that can move outgoing traffic to a new network identity
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Attempt a rotation
    ///
    /// Returns whether the new identity is believed ready for traffic.
    /// Implementations must swallow their own errors and report `false`.
    async fn rotate(&self) -> bool;
}

/// Rotation capability handed to the orchestrator
#[derive(Clone, Default)]
pub enum IdentityRotation {
    /// No rotation available; escalate straight to the operator
    #[default]
    Unavailable,
    /// Rotation available through the given rotator
    Available(Arc<dyn IdentityRotator>),
}

impl IdentityRotation {
    /// Wrap a rotator
    pub fn available(rotator: impl IdentityRotator + 'static) -> Self {
        Self::Available(Arc::new(rotator))
    }

    /// Whether a rotator is configured
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Rotate if possible; `false` when unavailable or unsuccessful
    pub async fn rotate(&self) -> bool {
        match self {
            Self::Unavailable => false,
            Self::Available(rotator) => {
                info!(rotator = rotator.name(), "Rotating network identity");
                let ready = rotator.rotate().await;
                if ready {
                    info!(rotator = rotator.name(), "Network identity rotated");
                } else {
                    warn!(rotator = rotator.name(), "Network identity rotation failed");
                }
                ready
            }
        }
    }
}

impl std::fmt::Debug for IdentityRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Available(rotator) => write!(f, "Available({})", rotator.name()),
        }
    }
}

/// Time allowed for each rotation command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Settling time between disconnect and connect
const DISCONNECT_SETTLE: Duration = Duration::from_secs(3);

/// Settling time after a successful connect
const DEFAULT_STABILIZATION: Duration = Duration::from_secs(8);

/// Rotator driven by external commands (e.g. a VPN client CLI)
///
/// Runs the optional disconnect command, then the connect command, then
/// waits for the new route to stabilize. The connect command must exit
/// successfully for the rotation to count.
#[derive(Debug, Clone)]
pub struct CommandRotator {
    disconnect: Option<Vec<String>>,
    connect: Vec<String>,
    command_timeout: Duration,
    disconnect_settle: Duration,
    stabilization: Duration,
}

impl CommandRotator {
    /// Build from whitespace-separated command lines
    ///
    /// Returns `None` when the connect command is empty.
    pub fn from_command_lines(connect: &str, disconnect: Option<&str>) -> Option<Self> {
        let connect = split_command(connect)?;
        Some(Self {
            disconnect: disconnect.and_then(split_command),
            connect,
            command_timeout: COMMAND_TIMEOUT,
            disconnect_settle: DISCONNECT_SETTLE,
            stabilization: DEFAULT_STABILIZATION,
        })
    }

    /// Override the post-connect stabilization delay
    pub fn with_stabilization(mut self, stabilization: Duration) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Override the per-command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Override the pause between disconnect and connect
    pub fn with_disconnect_settle(mut self, settle: Duration) -> Self {
        self.disconnect_settle = settle;
        self
    }

    async fn run(&self, argv: &[String]) -> bool {
        let Some((program, args)) = argv.split_first() else {
            return false;
        };

        let child = Command::new(program).args(args).kill_on_drop(true).output();
        match tokio::time::timeout(self.command_timeout, child).await {
            Ok(Ok(output)) if output.status.success() => true,
            Ok(Ok(output)) => {
                warn!(
                    command = %argv.join(" "),
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Rotation command failed"
                );
                false
            }
            Ok(Err(e)) => {
                error!(command = %argv.join(" "), error = %e, "Rotation command could not start");
                false
            }
            Err(_) => {
                error!(
                    command = %argv.join(" "),
                    timeout_secs = self.command_timeout.as_secs(),
                    "Rotation command timed out"
                );
                false
            }
        }
    }
}

#[async_trait]
impl IdentityRotator for CommandRotator {
    fn name(&self) -> &str {
        self.connect.first().map(String::as_str).unwrap_or("command")
    }

    async fn rotate(&self) -> bool {
        if let Some(disconnect) = &self.disconnect {
            // A failed disconnect is not fatal: some clients reconnect in place
            self.run(disconnect).await;
            tokio::time::sleep(self.disconnect_settle).await;
        }

        if !self.run(&self.connect).await {
            return false;
        }

        tokio::time::sleep(self.stabilization).await;
        true
    }
}

fn split_command(line: &str) -> Option<Vec<String>> {
    let argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        None
    } else {
        Some(argv)
    }
}
