//! Connection handle
//!
//! A [`Connection`] owns what its statements share: the query executor, the
//! metadata provider, the statement synthesizer and the cursor-name registry.
//! Statements keep a reference to the shared state, so a connection can be
//! dropped while its statements are still in use.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowset_cursor::{Config, Connection, FetchOrientation, StatementOptions, CursorType};
//!
//! let conn = Connection::new(Config::new(), executor, metadata);
//!
//! let mut stmt = conn.statement_with(StatementOptions::new().cursor_type(CursorType::Static))?;
//! stmt.execute("SELECT id, name FROM items")?;
//! let outcome = stmt.fetch(FetchOrientation::Absolute(3))?;
//! ```
//!
//! # Thread Safety
//!
//! `Connection` is `Send` and `Sync`; calls that reach the executor are
//! serialized through a mutex. A [`Statement`] is used from one thread at a
//! time (`&mut self` methods) but may be moved between threads.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{Config, StatementOptions};
use crate::error::{Error, Result};
use crate::executor::{MetadataProvider, QueryExecutor};
use crate::registry::CursorRegistry;
use crate::statement::Statement;
use crate::synthesizer::Synthesizer;

/// Mutable connection state, guarded by the connection mutex
pub(crate) struct ConnectionInner {
    pub executor: Box<dyn QueryExecutor>,
    pub registry: CursorRegistry,
}

/// State shared between a connection and its statements
pub(crate) struct Shared {
    inner: Mutex<ConnectionInner>,
    metadata: Arc<dyn MetadataProvider>,
    config: Config,
    synthesizer: Synthesizer,
    next_statement_id: AtomicU64,
    id: u32,
}

impl Shared {
    /// Lock the executor and registry
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ConnectionInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("connection mutex poisoned".to_string()))
    }

    pub(crate) fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }
}

// Connection ID counter
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// A connection: executor, metadata and cursor names shared by statements
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a connection over an executor and a metadata provider
    pub fn new<E, M>(config: Config, executor: E, metadata: M) -> Self
    where
        E: QueryExecutor + 'static,
        M: MetadataProvider + 'static,
    {
        Self::from_parts(config, Box::new(executor), Arc::new(metadata))
    }

    /// Create a connection from boxed collaborators
    pub fn from_parts(
        config: Config,
        executor: Box<dyn QueryExecutor>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = id, config = %config, "connection created");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(ConnectionInner {
                    executor,
                    registry: CursorRegistry::new(),
                }),
                metadata,
                synthesizer: Synthesizer::from_config(&config),
                config,
                next_statement_id: AtomicU64::new(1),
                id,
            }),
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// Connection configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Allocate a statement with default options
    pub fn statement(&self) -> Statement {
        let options =
            StatementOptions::new().row_array_size(self.shared.config.default_row_array_size);
        let id = self.shared.next_statement_id.fetch_add(1, Ordering::Relaxed);
        Statement::new(id, Arc::clone(&self.shared), options)
    }

    /// Allocate a statement with options
    ///
    /// A cursor type the configuration does not allow is downgraded; the
    /// statement then carries an `01S02` diagnostic.
    pub fn statement_with(&self, options: StatementOptions) -> Result<Statement> {
        let mut stmt = self.statement();
        stmt.set_options(options)?;
        Ok(stmt)
    }

    /// Cursor names registered on this connection
    pub fn cursor_names(&self) -> Result<Vec<String>> {
        Ok(self.shared.lock()?.registry.names())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
