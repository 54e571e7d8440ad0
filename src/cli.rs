use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "glprov")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of GitLab groups and branches", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./gitlab.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (default: <config>.state.json)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// GitLab access token
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// GitLab API root, e.g. https://gitlab.example.com/api/v4
    #[arg(long, env = "GITLAB_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Refresh state and show what apply would change
    Plan(PlanArgs),

    /// Converge GitLab with the declared resources
    Apply(ApplyArgs),

    /// Re-read every tracked resource and record what GitLab reports
    Refresh(JobsArgs),

    /// Adopt an existing GitLab resource into state
    Import {
        /// Address to record it under, e.g. gitlab_branch.feature
        address: String,

        /// Remote identifier: <project>-<branch> for branches, ID or full path for groups
        id: String,
    },

    /// Delete every tracked resource
    Destroy(DestroyArgs),

    /// Show tracked resources
    Show {
        /// Only this address (type.name)
        address: Option<String>,
    },

    /// Describe resource attributes
    Schema {
        /// Resource type, e.g. gitlab_group
        resource_type: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Target specific resources (type or type.name)
    #[arg(short, long)]
    pub target: Option<String>,

    #[command(flatten)]
    pub jobs: JobsArgs,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Target specific resources (type or type.name)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub jobs: JobsArgs,
}

#[derive(Debug, Args)]
pub struct DestroyArgs {
    /// Target specific resources (type or type.name)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub jobs: JobsArgs,
}
