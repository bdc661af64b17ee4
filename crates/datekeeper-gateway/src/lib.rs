//! # DateKeeper Gateway
//! HTTP API: documents, notification settings, stats and manual reminder runs.
//! Also hosts the scheduler loop when serving.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
