use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use mockroot_core::DependencyId;
use std::path::PathBuf;

/// Environment variable naming the host configuration file.
pub const HOST_CONFIG_ENV: &str = "MOCKROOT_HOST_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "mockroot")]
#[command(about = "Run a command against a unit whose dependencies are replaced by generated mocks")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Output logs in JSON format (same as --log-format json)")]
    pub json: bool,
}

impl Cli {
    /// The log format after `--json` is taken into account.
    pub const fn tracing_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Show version information")]
    Version,
    #[command(about = "Build a mock workspace for a unit and run a command inside it")]
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        env = HOST_CONFIG_ENV,
        default_value = "mockroot.toml",
        value_name = "FILE",
        help = "Host configuration naming the toolchain commands"
    )]
    pub host_config: PathBuf,

    #[arg(long, value_name = "FILE", help = "Per-dependency mock configuration")]
    pub config: Option<PathBuf>,

    #[arg(long = "link", value_name = "ID", help = "Link a dependency through unchanged")]
    pub links: Vec<DependencyId>,

    #[arg(long, value_name = "FILE", help = "Link every dependency listed in a file")]
    pub link_from: Option<PathBuf>,

    #[arg(long = "exclude", value_name = "ID", help = "Never mock a dependency")]
    pub excludes: Vec<DependencyId>,

    #[arg(long, value_name = "FILE", help = "Never mock any dependency listed in a file")]
    pub exclude_from: Option<PathBuf>,

    #[arg(short = 'k', long, help = "Keep the work directory and print its location")]
    pub keep_work: bool,

    #[arg(short = 'n', long, help = "Show command output without translating paths")]
    pub no_translate: bool,

    #[arg(help = "The unit under test")]
    pub unit: DependencyId,

    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND",
        help = "Command to run inside the unit's test root"
    )]
    pub command: Vec<String>,
}
