//! OpenAPI Bridge Library
//!
//! Compiles a machine-readable REST API description (an OpenAPI document)
//! into a table of callable operations and readable resources for an
//! automated agent.
//!
//! # Features
//!
//! - **Schema translation**: recursive OpenAPI schema nodes become runtime
//!   validators; malformed fragments degrade instead of failing the compile
//! - **Deterministic naming**: collision-free `[a-z0-9_]` identifiers with
//!   first-seen-wins deduplication
//! - **Argument routing**: one flat argument bag is reassembled into the
//!   path/query/body shape the HTTP operation requires
//! - **Pacing**: a token bucket bounds sustained outbound call rate
//! - **Outcome classification**: HTTP failures map to a small taxonomy the
//!   agent can reason about

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod pacer;
pub mod protocol;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
