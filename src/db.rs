use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use diesel::connection::{Instrumentation, InstrumentationEvent};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::result::Error::{self as DieselError, NotFound};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::directory::DirectoryError;

pub const EMBEDDED_KEYWORD: &str = "sqlite";
pub const EMBEDDED_FILE: &str = "quotient.db";

const EMBEDDED_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
const SERVER_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

const EMBEDDED_PRAGMAS: &str =
    "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;";

/// Runs `$body` against a pooled connection of whichever backend `$db` holds.
///
/// The body is expanded once per backend, so it is type checked against both
/// `SqliteConnection` and `PgConnection`.
macro_rules! with_conn {
    ($db:expr, $err:path, |$conn:ident| $body:expr) => {{
        match &$db.backend {
            $crate::db::Backend::Embedded(pool) => {
                let mut pooled = pool.get().map_err($crate::db::DbError::GetConn)?;
                let $conn: &mut ::diesel::SqliteConnection = &mut pooled;
                $body.map_err($err)
            }
            $crate::db::Backend::Server(pool) => {
                let mut pooled = pool.get().map_err($crate::db::DbError::GetConn)?;
                let $conn: &mut ::diesel::PgConnection = &mut pooled;
                $body.map_err($err)
            }
        }
    }};
}

/// Where the state lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Single-file SQLite store, created if missing.
    Embedded(PathBuf),
    /// PostgreSQL connection url.
    Server(String),
}

impl Target {
    /// The keyword `sqlite` (any case) selects the embedded store at
    /// [`EMBEDDED_FILE`]; anything else is a postgres connection string.
    pub fn from_descriptor(descriptor: impl AsRef<str>) -> Self {
        let descriptor = descriptor.as_ref();
        if descriptor.eq_ignore_ascii_case(EMBEDDED_KEYWORD) {
            Target::Embedded(PathBuf::from(EMBEDDED_FILE))
        } else {
            Target::Server(descriptor.to_owned())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Dialect {
    #[display(fmt = "sqlite")]
    Sqlite,
    #[display(fmt = "postgres")]
    Postgres,
}

/// How a backend empties the scoring history tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetStrategy {
    /// One unconditional delete per table inside a transaction.
    DeleteInTransaction,
    /// A single `TRUNCATE ... CASCADE` over all tables.
    TruncateCascade,
}

impl Dialect {
    pub fn reset_strategy(self) -> ResetStrategy {
        match self {
            Dialect::Sqlite => ResetStrategy::DeleteInTransaction,
            Dialect::Postgres => ResetStrategy::TruncateCascade,
        }
    }
}

#[derive(Clone)]
pub(crate) enum Backend {
    Embedded(Pool<ConnectionManager<SqliteConnection>>),
    Server(Pool<ConnectionManager<PgConnection>>),
}

/// Shared handle to the competition state. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    pub(crate) backend: Backend,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Db").field("dialect", &self.dialect()).finish()
    }
}

#[derive(Debug, Display)]
pub enum DbError {
    #[display(fmt = "couldn't create database directory: {}", _0)]
    CreateDir(std::io::Error),
    #[display(fmt = "couldn't connect to the db: {}", _0)]
    Pool(r2d2::Error),
    #[display(fmt = "couldn't get a connection: {}", _0)]
    GetConn(r2d2::Error),
    #[display(fmt = "migration failed: {}", _0)]
    Migration(Box<dyn StdError + Send + Sync>),
    #[display(fmt = "couldn't load boxes: {}", _0)]
    LoadBoxes(DieselError),
    #[display(fmt = "couldn't get boxes: {}", _0)]
    GetBoxes(DieselError),
    #[display(fmt = "couldn't update box: {}", _0)]
    UpdateBox(DieselError),
    #[display(fmt = "couldn't add team: {}", _0)]
    AddTeam(DieselError),
    #[display(fmt = "couldn't get teams: {}", _0)]
    GetTeams(DieselError),
    #[display(fmt = "couldn't reset scores: {}", _0)]
    ResetScores(DieselError),
    #[display(fmt = "directory sync failed: {}", _0)]
    Directory(DirectoryError),
}

impl StdError for DbError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DbError::CreateDir(err) => Some(err),
            DbError::Pool(err) | DbError::GetConn(err) => Some(err),
            DbError::Migration(err) => Some(err.as_ref()),
            DbError::LoadBoxes(err)
            | DbError::GetBoxes(err)
            | DbError::UpdateBox(err)
            | DbError::AddTeam(err)
            | DbError::GetTeams(err)
            | DbError::ResetScores(err) => Some(err),
            DbError::Directory(err) => Some(err),
        }
    }
}

impl DbError {
    /// Whether this is the expected "no such record" outcome of a lookup.
    pub fn is_not_found(&self) -> bool {
        match self {
            DbError::LoadBoxes(NotFound)
            | DbError::GetBoxes(NotFound)
            | DbError::UpdateBox(NotFound)
            | DbError::AddTeam(NotFound)
            | DbError::GetTeams(NotFound)
            | DbError::ResetScores(NotFound) => true,
            _ => false,
        }
    }
}

/// Logs statements that fail. Lookups that come back empty succeed at the
/// statement level, so they never show up here.
#[derive(Debug, Default)]
struct QueryLogger;

impl Instrumentation for QueryLogger {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::FinishQuery {
                query,
                error: Some(err),
                ..
            } => warn!("query failed: {} ({})", query, err),
            InstrumentationEvent::FinishQuery { query, .. } => trace!("query: {}", query),
            InstrumentationEvent::RollbackTransaction { depth, .. } => {
                debug!("rolled back transaction at depth {}", depth)
            }
            _ => {}
        }
    }
}

/// Per-connection setup run by the pool whenever it opens a connection.
#[derive(Debug, Clone, Copy)]
struct SessionSetup {
    pragmas: Option<&'static str>,
}

impl<C> CustomizeConnection<C, diesel::r2d2::Error> for SessionSetup
where
    C: Connection + 'static,
{
    fn on_acquire(&self, conn: &mut C) -> Result<(), diesel::r2d2::Error> {
        if let Some(pragmas) = self.pragmas {
            conn.batch_execute(pragmas)
                .map_err(diesel::r2d2::Error::QueryError)?;
        }
        conn.set_instrumentation(QueryLogger);
        Ok(())
    }
}

impl Db {
    /// Opens the store named by `descriptor` and brings its schema up to date.
    pub fn connect(descriptor: impl AsRef<str>) -> Result<Self, DbError> {
        Db::connect_to(&Target::from_descriptor(descriptor))
    }

    pub fn connect_to(target: &Target) -> Result<Self, DbError> {
        let db = Db::open(target)?;
        info!("connected to {} database", db.dialect());
        db.migrate()?;
        Ok(db)
    }

    /// Builds the connection pool without touching the schema.
    pub fn open(target: &Target) -> Result<Self, DbError> {
        let backend = match target {
            Target::Embedded(path) => {
                create_parent_dir(path)?;
                let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
                // a single writer connection; sqlite serializes writes anyway
                let pool = Pool::builder()
                    .max_size(1)
                    .connection_timeout(Duration::from_secs(30))
                    .connection_customizer(Box::new(SessionSetup {
                        pragmas: Some(EMBEDDED_PRAGMAS),
                    }))
                    .build(manager)
                    .map_err(DbError::Pool)?;
                Backend::Embedded(pool)
            }
            Target::Server(url) => {
                let manager = ConnectionManager::<PgConnection>::new(url.as_str());
                let pool = Pool::builder()
                    .connection_customizer(Box::new(SessionSetup { pragmas: None }))
                    .build(manager)
                    .map_err(DbError::Pool)?;
                Backend::Server(pool)
            }
        };
        Ok(Db { backend })
    }

    pub fn dialect(&self) -> Dialect {
        match self.backend {
            Backend::Embedded(_) => Dialect::Sqlite,
            Backend::Server(_) => Dialect::Postgres,
        }
    }

    /// Applies pending migrations for the active backend. Safe to re-run.
    pub fn migrate(&self) -> Result<(), DbError> {
        let applied = match &self.backend {
            Backend::Embedded(pool) => {
                let mut conn = pool.get().map_err(DbError::GetConn)?;
                let conn: &mut SqliteConnection = &mut conn;
                conn.run_pending_migrations(EMBEDDED_MIGRATIONS)
                    .map(|versions| versions.len())
                    .map_err(DbError::Migration)?
            }
            Backend::Server(pool) => {
                let mut conn = pool.get().map_err(DbError::GetConn)?;
                let conn: &mut PgConnection = &mut conn;
                conn.run_pending_migrations(SERVER_MIGRATIONS)
                    .map(|versions| versions.len())
                    .map_err(DbError::Migration)?
            }
        };
        if applied > 0 {
            info!("applied {} migration(s)", applied);
        }
        Ok(())
    }
}

fn create_parent_dir(path: &Path) -> Result<(), DbError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent).map_err(DbError::CreateDir)
        }
        _ => Ok(()),
    }
}
