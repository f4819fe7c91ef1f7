use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kmodctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Load kernel modules now and keep them loaded across reboots", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = "KMODCTL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load (or unload) one module and persist the choice
    Load(LoadArgs),

    /// Reconcile every module listed in the configuration file
    Apply(ApplyArgs),

    /// Show what load or apply would change
    Diff(DiffArgs),

    /// Show detected host facts and the persistence mechanism
    Facts(FactsArgs),

    /// Check whether a module is loaded (exit code 1 when it is not)
    Probe {
        /// Module name
        name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Load
// ============================================================================

#[derive(Args)]
pub struct LoadArgs {
    /// Module name
    pub name: String,

    /// Whether the module should be loaded or unloaded
    #[arg(short, long, value_enum, default_value = "present")]
    pub ensure: EnsureArg,

    /// Config file to edit on Debian and Suse hosts
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub permissions: PermissionArgs,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Overrides for the configured permission policy
#[derive(Args, Default)]
pub struct PermissionArgs {
    /// Owner of persistence files
    #[arg(long)]
    pub owner: Option<String>,

    /// Group of persistence files
    #[arg(long)]
    pub group: Option<String>,

    /// Mode of static persistence files (octal)
    #[arg(long)]
    pub file_mode: Option<String>,

    /// Mode of persistence scripts (octal)
    #[arg(long)]
    pub exec_mode: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum EnsureArg {
    Present,
    Absent,
}

impl From<EnsureArg> for kmod::EnsureState {
    fn from(arg: EnsureArg) -> Self {
        match arg {
            EnsureArg::Present => Self::Present,
            EnsureArg::Absent => Self::Absent,
        }
    }
}

// ============================================================================
// Apply / Diff
// ============================================================================

#[derive(Args)]
pub struct ApplyArgs {
    /// Only reconcile these modules
    pub modules: Vec<String>,

    /// Number of modules reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the reports as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Only diff these modules (defaults to every configured module)
    pub modules: Vec<String>,

    /// Print the diffs as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Args)]
pub struct FactsArgs {
    /// Print the facts as JSON
    #[arg(long)]
    pub json: bool,
}
