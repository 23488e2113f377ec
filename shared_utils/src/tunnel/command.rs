//! Provisioning service backed by external commands.
//!
//! Each lifecycle call runs the matching command from [`ProvisioningConfig`]
//! through `sh -c`. The registered bundle reaches the script as `$1`, and
//! `{bundle_id}` in a template expands to a quoted reference to it, so the
//! identifier is never parsed as shell code.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::config::ProvisioningConfig;
use crate::stats::DataCount;
use crate::tunnel::config::TunnelIdentity;
use crate::tunnel::error::{ProvisioningError, ProvisioningResult};
use crate::tunnel::provisioning::{ProvisioningService, ReportedState};
use crate::tunnel::types::{BundleId, TunnelStatus};

const BUNDLE_PLACEHOLDER: &str = "{bundle_id}";
const BUNDLE_ARGUMENT: &str = "\"$1\"";
const SCRIPT_NAME: &str = "tunnelkit";

/// Drives a host tunnel through configured shell commands.
#[derive(Debug)]
pub struct CommandProvisioning {
    commands: ProvisioningConfig,
    registered: Mutex<Option<BundleId>>,
}

impl CommandProvisioning {
    /// Create a service running `commands`.
    pub fn new(commands: ProvisioningConfig) -> Self {
        CommandProvisioning {
            commands,
            registered: Mutex::new(None),
        }
    }

    /// The configured commands.
    pub fn commands(&self) -> &ProvisioningConfig {
        &self.commands
    }

    /// Bundle registered by the last successful `register`.
    pub fn registered(&self) -> Option<BundleId> {
        self.slot().clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<BundleId>> {
        self.registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `template` for `bundle`, returning trimmed stdout.
    ///
    /// `Ok(None)` when no command is configured.
    async fn run(
        &self,
        template: Option<&str>,
        bundle: Option<&BundleId>,
    ) -> Result<Option<String>, String> {
        let Some(template) = template else {
            return Ok(None);
        };
        let command = substitute(template);
        debug!(cmd = %command, "running provisioning command");

        let output = TokioCommand::new("sh")
            .arg("-c")
            .arg(&command)
            .arg(SCRIPT_NAME)
            .arg(bundle.map(BundleId::as_str).unwrap_or(""))
            .output()
            .await
            .map_err(|e| format!("{}: {}", command, e))?;

        if output.status.success() {
            Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(if stderr.is_empty() {
                format!("{} exited with {}", command, output.status)
            } else {
                stderr
            })
        }
    }
}

fn substitute(template: &str) -> String {
    template.replace(BUNDLE_PLACEHOLDER, BUNDLE_ARGUMENT)
}

/// Parse `<status> [enabled|disabled]` as printed by the status command.
fn parse_status_line(line: &str, bundle_id: Option<BundleId>) -> Option<ReportedState> {
    let mut words = line.split_whitespace();
    let status: TunnelStatus = words.next()?.parse().ok()?;
    let enabled = match words.next() {
        Some("enabled") => true,
        Some("disabled") => false,
        Some(_) => return None,
        None => status != TunnelStatus::Disconnected,
    };
    Some(ReportedState {
        bundle_id,
        enabled,
        status,
    })
}

#[async_trait]
impl ProvisioningService for CommandProvisioning {
    async fn register(&self, identity: &TunnelIdentity) -> ProvisioningResult<()> {
        self.run(
            self.commands.register_command.as_deref(),
            Some(&identity.bundle_id),
        )
        .await
        .map_err(ProvisioningError::RegistrationFailed)?;
        *self.slot() = Some(identity.bundle_id.clone());
        Ok(())
    }

    async fn start(&self) -> ProvisioningResult<()> {
        let bundle = self.registered();
        self.run(self.commands.start_command.as_deref(), bundle.as_ref())
            .await
            .map_err(ProvisioningError::StartFailed)?;
        Ok(())
    }

    async fn stop(&self) {
        let bundle = self.registered();
        if let Err(reason) = self
            .run(self.commands.stop_command.as_deref(), bundle.as_ref())
            .await
        {
            warn!(error = %reason, "Stop command failed");
        }
    }

    async fn remove(&self) -> ProvisioningResult<()> {
        let bundle = self.registered();
        self.run(self.commands.remove_command.as_deref(), bundle.as_ref())
            .await
            .map_err(ProvisioningError::RemovalFailed)?;
        *self.slot() = None;
        Ok(())
    }

    async fn reported_state(&self) -> Option<ReportedState> {
        let bundle = self.registered();
        match self
            .run(self.commands.status_command.as_deref(), bundle.as_ref())
            .await
        {
            Ok(Some(stdout)) => {
                let reported = parse_status_line(stdout.lines().next()?, bundle);
                if reported.is_none() {
                    debug!(output = %stdout, "Ignoring unparseable status output");
                }
                reported
            }
            Ok(None) => None,
            Err(reason) => {
                debug!(error = %reason, "Status command failed");
                None
            }
        }
    }

    async fn data_count(&self) -> Option<DataCount> {
        let bundle = self.registered();
        let stdout = self
            .run(self.commands.stats_command.as_deref(), bundle.as_ref())
            .await
            .ok()??;
        DataCount::from_wireguard_string(&stdout)
    }
}
