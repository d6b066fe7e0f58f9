//! SMGR CLI - storage manager front end
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`SMGR_*`)
//! 3. Project config (`.smgr/config.toml` in the project root)
//! 4. Global config (`~/.smgr/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `SMGR_ENABLED`: Enable the storage manager (`true`/`false`)
//! - `SMGR_PROMPT_TESTING`: Answer prompts without asking
//! - `SMGR_PROMPT_TESTING_ALLOW`: The answer used in testing mode
//! - `SMGR_DEFAULT_QUOTA`: Default per-site quota in bytes
//!
//! # Principals
//!
//! `system`, or an origin URL such as `https://example.com`.

mod commands;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use commands::{Answering, EstimateSeed};
use smgr_runtime::components::PromptAnswer;
use smgr_runtime::{
    ConfigError, ConfigLoader, ConfigResolver, PersistentStoragePermission, SmgrConfig,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// SMGR CLI - storage manager front end
#[derive(Parser, Debug)]
#[command(name = "smgr")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    /// Answer every prompt without asking (also: SMGR_PROMPT_TESTING)
    #[arg(long, value_name = "ANSWER", global = true)]
    testing: Option<TestingAnswer>,

    /// Default per-site quota in bytes (also: SMGR_DEFAULT_QUOTA)
    #[arg(long, value_name = "BYTES", global = true)]
    default_quota: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report usage and quota for a principal
    Estimate(EstimateArgs),
    /// Ask whether a principal may persist its storage
    Persist(PersistArgs),
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(ClapArgs, Debug)]
struct EstimateArgs {
    /// `system` or an origin URL
    principal: String,

    /// Bytes already used by the principal
    #[arg(long)]
    usage: Option<u64>,

    /// Quota override for the principal
    #[arg(long)]
    quota: Option<u64>,

    /// Make the accounting lookup fail with this code
    #[arg(long, value_name = "CODE")]
    fail_code: Option<u32>,
}

#[derive(ClapArgs, Debug)]
struct PersistArgs {
    /// `system` or an origin URL
    principal: String,

    /// Grant the prompt without asking
    #[arg(long, group = "answer")]
    allow: bool,

    /// Deny the prompt without asking
    #[arg(long, group = "answer")]
    deny: bool,

    /// Close the prompt without answering
    #[arg(long, group = "answer")]
    dismiss: bool,

    /// Permission already recorded for the principal
    #[arg(long, value_name = "STATE")]
    stored: Option<StoredPermission>,
}

impl PersistArgs {
    fn answering(&self) -> Answering {
        if self.allow {
            Answering::Fixed(PromptAnswer::Allow)
        } else if self.deny {
            Answering::Fixed(PromptAnswer::Deny)
        } else if self.dismiss {
            Answering::Fixed(PromptAnswer::Dismiss)
        } else {
            Answering::Interactive
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TestingAnswer {
    Grant,
    Deny,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StoredPermission {
    Granted,
    Denied,
}

impl From<StoredPermission> for PersistentStoragePermission {
    fn from(value: StoredPermission) -> Self {
        match value {
            StoredPermission::Granted => Self::Granted,
            StoredPermission::Denied => Self::Denied,
        }
    }
}

/// CLI-based configuration resolver.
///
/// Merges file/env config via [`ConfigLoader`] and applies CLI argument
/// overrides as the highest-priority layer.
struct CliConfigResolver {
    project_root: PathBuf,
    testing: Option<TestingAnswer>,
    default_quota: Option<u64>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        });

        Self {
            project_root,
            testing: args.testing,
            default_quota: args.default_quota,
        }
    }

    fn resolve(&self) -> Result<SmgrConfig, ConfigError> {
        let mut config = ConfigLoader::new()
            .with_project_root(&self.project_root)
            .load()?;
        self.apply(&mut config);
        Ok(config)
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut SmgrConfig) {
        if let Some(answer) = self.testing {
            config.prompt.testing = true;
            config.prompt.testing_allow = answer == TestingAnswer::Grant;
        }
        if let Some(quota) = self.default_quota {
            config.accounting.default_quota = quota;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Terminal filter: --debug > --verbose > RUST_LOG env > default "warn"
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver
        .resolve()
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    info!(path = %resolver.project_root.display(), "Project root");

    let exit_code = match &args.command {
        Command::Estimate(cmd) => {
            let seed = EstimateSeed {
                usage: cmd.usage,
                quota: cmd.quota,
                fail_code: cmd.fail_code,
            };
            commands::estimate(&config, &cmd.principal, seed).await?
        }
        Command::Persist(cmd) => {
            commands::persist(
                &config,
                &cmd.principal,
                cmd.stored.map(Into::into),
                cmd.answering(),
            )
            .await?
        }
        Command::Config => commands::config(&config)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
