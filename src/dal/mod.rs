//! Database abstraction layer
//!
//! Each submodule adds the operations for one part of the competition state
//! to [`Db`](crate::Db).

mod boxes;
mod reset;
mod team;
