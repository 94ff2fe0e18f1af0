//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Resilient VM lifecycle orchestration for session-based hypervisor endpoints
#[derive(Parser)]
#[command(
    name = "vmops",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log workflow details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create and start an instance
    Spawn(commands::spawn::SpawnArgs),

    /// Power off and remove an instance
    Destroy(commands::destroy::DestroyArgs),

    /// Change an instance's power state
    Power(commands::power::PowerArgs),

    /// Move an instance to another host
    #[command(subcommand)]
    Migrate(commands::migrate::MigrateCommand),

    /// Boot a rescue VM with the instance disk attached
    Rescue(commands::rescue::RescueArgs),

    /// Remove the rescue VM and restart the instance
    Unrescue {
        /// Instance name
        name: String,
    },

    /// Export an instance disk as an image
    Snapshot(commands::snapshot::SnapshotArgs),

    /// List instances
    List,

    /// Show instance details
    Info {
        /// Instance name
        name: String,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose,
            command,
        } = self;
        crate::infra::logging::init(verbose);
        let yes = matches!(&command, Command::Destroy(args) if args.yes);
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        });
        match command {
            Command::Spawn(args) => commands::spawn::run(&app, &args).await,
            Command::Destroy(args) => commands::destroy::run(&app, &args).await,
            Command::Power(args) => commands::power::run(&app, &args).await,
            Command::Migrate(cmd) => commands::migrate::run(&app, &cmd).await,
            Command::Rescue(args) => commands::rescue::rescue(&app, &args).await,
            Command::Unrescue { name } => commands::rescue::unrescue(&app, &name).await,
            Command::Snapshot(args) => commands::snapshot::run(&app, &args).await,
            Command::List => commands::list::run(&app).await,
            Command::Info { name } => commands::info::run(&app, &name).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
