//! Lifecycle tools: install, activate and status.
//!
//! The host honours the controller's skip-waiting request by activating
//! straight after a successful install.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ActivateReport, CacheController, InstallReport};
use shellcache_core::Error;

use super::json_result;

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutput {
    pub install: InstallReport,
    /// Present when the host activated immediately.
    pub activate: Option<ActivateReport>,
}

/// Bring the controller to the active state on process start.
///
/// Resumes from a shell stored by an earlier run when possible, otherwise
/// installs and activates. Failures leave the controller passing requests
/// through; `sw_install` can retry.
pub async fn bootstrap(controller: &CacheController) -> Result<(), Error> {
    if let Some(report) = controller.resume().await? {
        tracing::info!(version = %report.version, deleted = report.deleted.len(), "resumed stored shell");
        return Ok(());
    }

    let install = controller.install().await?;
    if install.skip_waiting {
        controller.activate().await?;
    }
    Ok(())
}

/// Implementation of the sw_install tool.
pub async fn install_impl(controller: &CacheController) -> Result<CallToolResult, McpError> {
    let install = controller.install().await?;
    let activate = if install.skip_waiting { Some(controller.activate().await?) } else { None };

    json_result(&InstallOutput { install, activate })
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(controller: &CacheController) -> Result<CallToolResult, McpError> {
    let report = controller.activate().await?;
    json_result(&report)
}

/// Implementation of the sw_status tool.
pub async fn status_impl(controller: &CacheController) -> Result<CallToolResult, McpError> {
    json_result(&controller.status().await)
}
