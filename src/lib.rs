//! StockCast Library
//!
//! A sales ledger with inventory that cannot go negative, plus day-ahead
//! demand forecasting computed from the ledger itself. Every store mutation
//! goes through a service; the services pair each ledger write with its
//! matching stock movement in one transaction.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod ml;
pub mod services;

pub mod prelude {
    pub use crate::auth::Actor;
    pub use crate::config::{load_config, AppConfig, ForecastTuning};
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::services::factory::{ServiceContainer, ServiceFactory};
}
