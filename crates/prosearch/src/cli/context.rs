//! Shared context for running CLI commands.

use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use prosearch_config::{CONFIG_FILENAME, Config};
use prosearch_index::{
    Connection, ConnectionProvider, Connector, EventSink, Indexer, IndexerOptions,
    MemoryRecordStore, SearchOptions, Searcher, TracingSink,
};

/// Command execution context built once per CLI invocation.
pub struct CommandContext {
    /// Current working directory.
    pub cwd: PathBuf,
    /// Explicit configuration file given with `--config`.
    pub config_override: Option<PathBuf>,
    /// Loaded configuration (default if no config file was found).
    pub config: Config,
    /// Receives engine events.
    sink: Arc<dyn EventSink>,
}

impl CommandContext {
    /// Loads the current directory and configuration.
    pub fn load(config_override: Option<&Path>) -> Result<Self, ExitCode> {
        let cwd = current_dir_or_failure()?;
        let config = match config_override {
            Some(path) => Config::load_from_file(path),
            None => Config::load(&cwd),
        }
        .map_err(|e| {
            eprintln!("error: failed to load configuration: {e}");
            ExitCode::FAILURE
        })?;
        Ok(Self {
            cwd,
            config_override: config_override.map(Path::to_path_buf),
            config,
            sink: Arc::new(TracingSink),
        })
    }

    /// Loads only the current directory, skipping configuration parsing.
    ///
    /// Used by `init`, which has to work even when an existing config file is invalid.
    pub fn load_cwd_only(config_override: Option<&Path>) -> Result<Self, ExitCode> {
        let cwd = current_dir_or_failure()?;
        Ok(Self {
            cwd,
            config_override: config_override.map(Path::to_path_buf),
            config: Config::default(),
            sink: Arc::new(TracingSink),
        })
    }

    /// Path of the configuration file `init` writes.
    pub fn init_path(&self) -> PathBuf {
        self.config_override
            .clone()
            .unwrap_or_else(|| self.cwd.join(CONFIG_FILENAME))
    }

    /// Builds a connection provider from the loaded credentials.
    pub fn provider(&self) -> ConnectionProvider<Config> {
        ConnectionProvider::new(self.config.clone(), self.sink.clone())
            .with_timeout(Duration::from_secs(self.config.search.timeout_secs))
    }

    /// Connects to the backend, printing a note when it is unavailable.
    pub fn connection(&self) -> Option<Connection> {
        let connection = self.provider().connect();
        if connection.is_none() {
            note_unavailable();
        }
        connection
    }

    /// Builds a searcher over an established connection.
    pub fn searcher(&self, connection: Connection) -> Searcher<Connection> {
        Searcher::new(
            connection,
            self.sink.clone(),
            SearchOptions::from(&self.config.search),
        )
    }

    /// Loads the record store and wraps it in an indexer.
    pub fn indexer(
        &self,
    ) -> Result<Indexer<MemoryRecordStore, ConnectionProvider<Config>>, ExitCode> {
        let store = MemoryRecordStore::load(&self.config.indexing.store).map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        })?;
        Ok(Indexer::new(
            store,
            self.provider(),
            self.sink.clone(),
            IndexerOptions::from(&self.config),
        ))
    }

    /// Writes the record store back to its file.
    pub fn save_store(&self, store: &MemoryRecordStore) -> Result<(), ExitCode> {
        store.save(&self.config.indexing.store).map_err(|e| {
            eprintln!("error: failed to save {}: {e}", self.config.indexing.store.display());
            ExitCode::FAILURE
        })
    }
}

/// Tells the user that no backend is reachable; commands then continue with empty results.
pub fn note_unavailable() {
    eprintln!("note: no search backend is available; check the [credentials] section");
}

/// Returns the current working directory or exits with a consistent error.
fn current_dir_or_failure() -> Result<PathBuf, ExitCode> {
    env::current_dir().map_err(|e| {
        eprintln!("error: could not determine current directory: {e}");
        ExitCode::FAILURE
    })
}
