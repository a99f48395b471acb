//! Cutroom HTTP API
//!
//! Upload endpoint, proxy streaming and edit session routes on top of the
//! content store. `main.rs` only loads the configuration and calls into
//! [`setup`].

pub mod api_doc;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod utils;
