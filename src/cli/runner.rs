//! CLI runner - executes commands

use crate::catalog::{discover, Catalog};
use crate::cli::commands::{Cli, Command};
use crate::config::TapConfig;
use crate::engine::{SyncEngine, SyncStats};
use crate::error::{Error, Result};
use crate::odata::{DynamicsService, ODataSource};
use crate::output::{Emitter, JsonLinesEmitter};
use crate::state::StateManager;
use std::io::Write;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = TapConfig::load(&self.cli.config)?;
        let service = DynamicsService::from_config(&config, Some(self.cli.config.clone()))?;

        match self.cli.command() {
            Command::Discover => {
                let catalog = discover(&service, config.include_lookup_tables).await?;
                write_catalog(&mut std::io::stdout(), &catalog)
            }
            Command::Sync => {
                let state = self.load_state()?;
                let catalog = self.load_catalog(&service, &config).await?;
                sync(&service, &config, &catalog, state, JsonLinesEmitter::stdout()).await?;
                Ok(())
            }
        }
    }

    /// Load state from inline JSON, a file, or start empty
    fn load_state(&self) -> Result<StateManager> {
        if let Some(json) = &self.cli.state_json {
            return StateManager::from_json(json);
        }
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    /// Read the supplied catalog, or discover one
    async fn load_catalog(&self, source: &dyn ODataSource, config: &TapConfig) -> Result<Catalog> {
        if let Some(path) = &self.cli.catalog {
            return Catalog::load(path);
        }
        info!("No catalog supplied, running discovery");
        discover(source, config.include_lookup_tables).await
    }
}

/// Replicate every selected stream of `catalog`
pub async fn sync<E: Emitter>(
    source: &dyn ODataSource,
    config: &TapConfig,
    catalog: &Catalog,
    state: StateManager,
    emitter: E,
) -> Result<SyncStats> {
    let mut engine = SyncEngine::new(source, emitter, state, config.start_date()?);
    engine.run(catalog).await
}

/// Print a catalog as pretty JSON
pub fn write_catalog(out: &mut impl Write, catalog: &Catalog) -> Result<()> {
    let json = catalog.to_json_pretty()?;
    writeln!(out, "{json}").map_err(|e| Error::output(format!("Failed to write catalog: {e}")))
}
