//! Fiscal invoicing: turns completed sales into legally issued invoices.
//!
//! An invoice is taxed, numbered, canonically encoded, hashed with SHA-256,
//! signed and given a QR verification payload before it is stored. After
//! issuance only its status moves, along a forward-only lifecycle.

pub mod config;
pub mod dtos;
pub mod error;
pub mod fiscal;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use error::FiscalError;
pub use startup::AppState;
