//! Cartwise storefront library.
//!
//! Cart, product, and suggestion API. The binary in `main.rs` wires these
//! modules to `PostgreSQL`; tests wire them to [`db::MemoryStore`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod mco;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
