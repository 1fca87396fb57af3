//! Startup shared by every subcommand: configuration, collaborators and a
//! session with the dataset loaded.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use cas_timeline_core::TimelineSession;
use cas_timeline_core::backend::{self, DatasetSource, Publisher};
use cas_timeline_core::config::{self, Config};
use cas_timeline_core::location::MemoryLocation;
use tracing::debug;

use crate::output::{self, OutputMode};

/// Everything a command needs after startup.
pub struct Workspace {
    pub config: Config,
    pub source: Arc<dyn DatasetSource>,
    pub public_source: Arc<dyn DatasetSource>,
    pub publisher: Option<Arc<dyn Publisher>>,
    pub session: TimelineSession,
}

impl Workspace {
    /// Load configuration and select collaborators. The dataset is not
    /// fetched yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be read.
    pub fn open(config_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let config = config::load_config(config_path, project_root)
            .context("failed to load configuration")?;
        let backends = backend::connect(&config);
        debug!(?backends, "collaborators selected");
        let location = MemoryLocation::new(&config.source.link_base);
        let session = TimelineSession::new(location, backends.store);
        Ok(Self {
            config,
            source: backends.source,
            public_source: backends.public_source,
            publisher: backends.publisher,
            session,
        })
    }

    /// Open and fetch the dataset.
    ///
    /// # Errors
    ///
    /// Returns an error when configuration or the dataset fetch fails; the
    /// fetch failure is also reported on stderr in `output` mode.
    pub fn load(config_path: Option<&Path>, project_root: &Path, output: OutputMode) -> Result<Self> {
        let mut ws = Self::open(config_path, project_root)?;
        ws.fetch(output)?;
        Ok(ws)
    }

    /// Fetch the dataset and install it in the session.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure after reporting it.
    pub fn fetch(&mut self, output: OutputMode) -> Result<()> {
        match self.source.fetch_dataset() {
            Ok(dataset) => {
                self.session.apply_dataset(dataset);
                Ok(())
            }
            Err(err) => {
                self.session.apply_fetch_failure(&err);
                Err(output::fail(output, err))
                    .with_context(|| format!("failed to load {}", self.source.describe()))
            }
        }
    }

    /// Unlock editing when a password was supplied.
    ///
    /// # Errors
    ///
    /// Returns the login rejection after reporting it.
    pub fn unlock(&mut self, password: Option<&str>, output: OutputMode) -> Result<()> {
        if let Some(password) = password {
            self.session
                .login(password)
                .map_err(|err| output::fail(output, err))?;
        } else {
            self.session.refresh_authorization();
        }
        Ok(())
    }
}
