//! Application context: unified state passed to every command handler.
//!
//! `AppContext` carries output settings and the config store. Commands that
//! talk to the endpoint call [`AppContext::connect`] for a [`Remote`], which
//! owns the logged-in session and hands out orchestrators borrowing it.

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::application::services::config_service;
use crate::application::services::network::HostNetworks;
use crate::application::services::session::{Credentials, Session};
use crate::application::services::vm::{Collaborators, Orchestrator};
use crate::application::services::volume::DiskAttacher;
use crate::domain::config::VmopsConfig;
use crate::infra::config::YamlConfigStore;
use crate::infra::gateway::HttpGateway;
use crate::infra::transport::HttpImageTransport;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Environment variable holding the endpoint password.
pub const PASSWORD_ENV: &str = "VMOPS_PASSWORD";

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `VMOPS_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode). Quiet in JSON mode so
    /// stdout carries only the JSON document.
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Configuration file access.
    pub config_store: YamlConfigStore,
    /// When `true`, skip interactive prompts and use defaults.
    pub non_interactive: bool,
}

/// Logged-in endpoint session plus the configuration it was opened with.
pub struct Remote {
    pub config: VmopsConfig,
    pub session: Session<HttpGateway>,
    password: String,
}

/// Orchestrator type wired to the production adapters.
pub type RemoteOrchestrator<'a> = Orchestrator<
    'a,
    HttpGateway,
    HostNetworks<'a, HttpGateway>,
    DiskAttacher<'a, HttpGateway>,
    HttpImageTransport,
>;

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("VMOPS_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Self {
            output: OutputContext::new(
                flags.output.no_color,
                flags.output.quiet || flags.output.json,
            ),
            mode,
            config_store: YamlConfigStore,
            non_interactive,
        }
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for long workflows.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `VMOPS_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// Load the configuration and log in to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured, the password variable
    /// is unset, or login fails.
    pub async fn connect(&self) -> Result<Remote> {
        let config = config_service::load_config(&self.config_store)?;
        if config.endpoint.host.is_empty() {
            let path = self.config_store.path()?;
            anyhow::bail!(
                "no endpoint configured in {}\n\nSet one: vmops config set endpoint.host <host>",
                path.display()
            );
        }
        let password = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{PASSWORD_ENV} is not set"))?;
        let base_url = config.endpoint.base_url();
        let session = Session::connect(
            HttpGateway::new(&base_url),
            Credentials::new(&base_url, &config.endpoint.username, &password),
            config.policy.to_policy(),
        )
        .await
        .with_context(|| format!("cannot log in to {base_url}"))?;
        Ok(Remote {
            config,
            session,
            password,
        })
    }
}

impl Remote {
    /// Orchestrator over this session with the production collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the image transport cannot be built.
    pub fn orchestrator(&self) -> Result<RemoteOrchestrator<'_>> {
        let settings = &self.config.provisioning;
        let images = HttpImageTransport::new(
            &self.config.endpoint.base_url(),
            &self.config.endpoint.username,
            &self.password,
            settings.image_dir.clone(),
        )?;
        Ok(Orchestrator::new(
            &self.session,
            settings,
            Collaborators {
                network: HostNetworks::new(
                    &self.session,
                    settings.cluster.as_deref(),
                    &settings.vlan_interface,
                ),
                volumes: DiskAttacher::new(&self.session),
                images,
            },
        ))
    }
}
