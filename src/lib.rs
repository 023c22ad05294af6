//! Keel - A layered REST backend starter
//!
//! HTTP handlers (`api`) call business services (`services`), which call
//! repositories (`db::repositories`) over a PostgreSQL or SQLite pool.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod services;
