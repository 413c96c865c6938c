//! Run-scoped processing session
//!
//! A [`Session`] owns the store connection for exactly one run. [`run`] opens it,
//! processes the source file, and closes it whether or not processing succeeded.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::history::{Clock, GateOutcome, HistoryGate};
use crate::pipeline::{self, IngestReport, IngestSettings};
use crate::source::WorkbookSource;
use crate::store::{SqliteStore, TableName, TableStore};

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub history: GateOutcome,
}

/// Store handle plus the resolved settings for one run
pub struct Session<S: TableStore = SqliteStore> {
    store: S,
    settings: IngestSettings,
    history_table: TableName,
}

impl Session<SqliteStore> {
    /// Open the configured SQLite database
    pub async fn open(config: &Config) -> Result<Self> {
        let settings = config.ingest_settings()?;
        let history_table = config.history_table()?;
        let database = config.database_path()?;

        log::info!(
            "Opening {} store at {}",
            config.environment.as_str(),
            database.display()
        );
        let store = SqliteStore::open(&database).await?;

        Ok(Self::with_store(store, settings, history_table))
    }

    /// Release the database connection
    pub async fn close(self) {
        self.store.close().await;
        log::debug!("Session closed");
    }
}

impl<S: TableStore> Session<S> {
    pub fn with_store(store: S, settings: IngestSettings, history_table: TableName) -> Self {
        Self {
            store,
            settings,
            history_table,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest one spreadsheet and gate its history record
    pub async fn process(&self, source_path: &Path, clock: &dyn Clock) -> Result<RunReport> {
        log::info!("Processing spreadsheet: {}", source_path.display());

        let mut source = WorkbookSource::open(source_path)?;
        let ingest = pipeline::ingest(&mut source, &self.store, source_path, &self.settings).await?;

        let history = HistoryGate::new(&self.store, &self.history_table)
            .decide_and_apply(&ingest.filename, ingest.flagged_line_count, clock)
            .await?;

        Ok(RunReport { ingest, history })
    }
}

/// Open a session, process `source_path`, and close the session on every exit path
pub async fn run(config: &Config, source_path: &Path, clock: &dyn Clock) -> Result<RunReport> {
    let session = Session::open(config).await?;
    let result = session.process(source_path, clock).await;
    session.close().await;
    result
}
