//! Protocol-facing types handed to the external session layer

mod types;

pub use types::*;
