//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;
use vmops_common::PowerState;

use crate::domain::config::VmopsConfig;
use crate::domain::{DestroyReport, InstanceInfo, InstanceSummary, PhaseResult};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("vmops {version}");
    }

    /// Render the instance table.
    pub fn render_instances(&self, instances: &[InstanceSummary]) {
        if instances.is_empty() {
            if !self.ctx.quiet {
                println!("No instances.");
            }
            return;
        }
        for instance in instances {
            println!(
                "  {:<32} {}",
                instance.name,
                power_state_display(instance.power_state)
                    .style(self.ctx.styles.power(instance.power_state))
            );
        }
    }

    /// Render details of one instance.
    pub fn render_info(&self, info: &InstanceInfo) {
        self.ctx.header(&info.name);
        self.ctx.kv("State:    ", power_state_display(info.power_state));
        self.ctx.kv("vCPUs:    ", &info.num_cpu.to_string());
        self.ctx.kv("Memory:   ", &format!("{} MB", info.memory_mb));
        if let Some(vmx) = &info.vmx_path {
            self.ctx.kv("Config:   ", vmx);
        }
        if let Some(disk) = &info.root_disk {
            self.ctx.kv("Root disk:", disk);
        }
    }

    /// Render the per-phase outcome of a destroy.
    pub fn render_destroy(&self, report: &DestroyReport) {
        if !report.found {
            self.ctx
                .info(&format!("Instance {} does not exist", report.name));
            return;
        }
        for (phase, result) in [
            ("power off", &report.powered_off),
            ("unregister", &report.unregister),
            ("delete files", &report.delete_files),
        ] {
            match result {
                PhaseResult::Ok => self.ctx.success(phase),
                PhaseResult::Skipped => self.ctx.kv(phase, "skipped"),
                PhaseResult::Failed(reason) => self.ctx.warn(&format!("{phase}: {reason}")),
            }
        }
        if report.has_failures() {
            self.ctx.warn(&format!(
                "Instance {} destroyed; some cleanup failed",
                report.name
            ));
        } else {
            self.ctx
                .success(&format!("Instance {} destroyed", report.name));
        }
    }

    /// Render the outcome of a single action on an instance.
    pub fn render_action(&self, name: &str, action: &str, changed: bool) {
        if changed {
            self.ctx.success(&format!("{name}: {action} done"));
        } else {
            self.ctx
                .info(&format!("{name}: {action} not needed, nothing changed"));
        }
    }

    /// Render the current vmops configuration.
    pub fn render_config(&self, config: &VmopsConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config_rows(config) {
            println!("  {:<36} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["VMOPS_CONFIG", "VMOPS_PASSWORD", "NO_COLOR"] {
            let value = match std::env::var(var) {
                Ok(_) if var == "VMOPS_PASSWORD" => "(set)".to_string(),
                Ok(v) => v,
                Err(_) => "(not set)".to_string(),
            };
            println!("    {:<18} {value}", format!("{var}:"));
        }
        println!();
    }
}

/// Display form of a power state.
#[must_use]
pub fn power_state_display(state: PowerState) -> &'static str {
    match state {
        PowerState::PoweredOn => "running",
        PowerState::PoweredOff => "stopped",
        PowerState::Suspended => "suspended",
    }
}

/// Flattened `key, value` pairs of every setting, in whitelist order.
#[must_use]
pub fn config_rows(config: &VmopsConfig) -> Vec<(&'static str, String)> {
    let optional = |v: Option<String>| v.unwrap_or_else(|| "(none)".to_string());
    vec![
        ("endpoint.host", config.endpoint.host.clone()),
        ("endpoint.scheme", config.endpoint.scheme.clone()),
        ("endpoint.username", config.endpoint.username.clone()),
        ("policy.retry_budget", config.policy.retry_budget.to_string()),
        (
            "policy.retry_delay_secs",
            config.policy.retry_delay_secs.to_string(),
        ),
        (
            "policy.task_poll_interval_secs",
            config.policy.task_poll_interval_secs.to_string(),
        ),
        (
            "policy.task_timeout_secs",
            optional(config.policy.task_timeout_secs.map(|s| s.to_string())),
        ),
        (
            "provisioning.use_linked_clone",
            config.provisioning.use_linked_clone.to_string(),
        ),
        (
            "provisioning.base_dir_name",
            config.provisioning.base_dir_name.clone(),
        ),
        (
            "provisioning.vlan_interface",
            config.provisioning.vlan_interface.clone(),
        ),
        (
            "provisioning.integration_bridge",
            config.provisioning.integration_bridge.clone(),
        ),
        (
            "provisioning.cluster",
            optional(config.provisioning.cluster.clone()),
        ),
        (
            "provisioning.image_dir",
            optional(
                config
                    .provisioning
                    .image_dir
                    .as_ref()
                    .map(|p| p.display().to_string()),
            ),
        ),
    ]
}
