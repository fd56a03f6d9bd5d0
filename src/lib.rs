//! Bootstrap and reset layer for the scoring engine's persistent state: the
//! boxes being scored, the competing teams and the scoring history.

#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate log;

pub mod setup_logging;

mod config;
#[macro_use]
mod db;
mod dal;
pub mod directory;
pub mod models;
pub mod schema;

pub use crate::config::{
    BoxConfig, ConfigError, ConfigSettings, DatabaseConfig, LdapSettings, TeamConfig,
};
pub use crate::db::{Db, DbError, Dialect, ResetStrategy, Target, EMBEDDED_FILE, EMBEDDED_KEYWORD};
