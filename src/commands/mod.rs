//! Command implementations
//!
//! Every command that talks to GitLab works on a [`Workspace`]: the parsed
//! config, the recorded state and a registry of resource kinds sharing one
//! client.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod schema;
pub mod show;

use anyhow::Result;
use declarative::{ExecutionPlan, RefreshReport, Registry, Tracked};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::config::Config;
use crate::progress;
use crate::provider;
use crate::state::StateFile;
use crate::ui;

/// Config, state and provider for one invocation
pub struct Workspace {
    pub config: Config,
    pub state_path: PathBuf,
    pub state: StateFile,
    pub registry: Registry,
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

impl Workspace {
    /// Load config and state and connect the provider
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.config.as_deref())?;
        let settings = config
            .provider
            .clone()
            .with_overrides(ctx.token.as_deref(), ctx.base_url.as_deref());
        let client = provider::client(&settings);
        let registry = provider::registry(&client, &settings.default_ref);

        let state_path = ctx
            .state
            .as_deref()
            .map_or_else(|| config.default_state_path(), expand);
        Self::with_registry(config, state_path, registry)
    }

    /// Assemble a workspace around an existing registry
    pub fn with_registry(config: Config, state_path: PathBuf, registry: Registry) -> Result<Self> {
        let state = StateFile::load(&state_path)?;
        Ok(Self {
            config,
            state_path,
            state,
            registry,
        })
    }

    /// Recorded instances
    pub fn tracked(&self) -> Tracked {
        self.state.tracked()
    }

    /// Record `tracked` and write the state file
    pub fn save(&mut self, tracked: &Tracked) -> Result<()> {
        self.state.set_tracked(tracked);
        self.state.save(&self.state_path)
    }

    /// Read every tracked instance from GitLab, reporting drift
    pub fn refresh(&self, jobs: usize) -> Result<RefreshReport> {
        let tracked = self.tracked();
        let spinner = progress::spinner(&format!("Refreshing {} resource(s)...", tracked.len()));
        let report = declarative::refresh(&self.registry, &tracked, jobs);
        spinner.finish_and_clear();
        let report = report?;

        for address in &report.missing {
            ui::warn(&format!("{address} no longer exists in GitLab"));
        }
        for (address, error) in &report.errors {
            ui::error(&format!("Could not refresh {address}: {error}"));
        }
        Ok(report)
    }

    /// Plan convergence of the refreshed state towards the config
    pub fn plan(&self, report: &RefreshReport, target: Option<&str>) -> Result<ExecutionPlan> {
        let plan = ExecutionPlan::build(
            &self.registry,
            &self.config.declarations,
            &report.tracked,
            &report.missing,
        )?;
        Ok(plan.filter_by_target(target))
    }
}
