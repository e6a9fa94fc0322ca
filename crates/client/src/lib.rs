//! Client-side prediction for the tick kernel.
//!
//! A client applies its own actions immediately to a projected world and
//! sends them to the server numbered by commit level. Each authoritative tick
//! replaces the confirmed view and the projection is rebuilt from it.
//!
//! # Invariants
//! - Once every local action is confirmed and every follow-up has landed,
//!   the projection equals the confirmed view.
//! - Applying a tick yields the same projection whether or not the client
//!   speculated the actions that tick confirmed.

mod error;
mod listener;
mod projection;
mod runner;
mod update;
mod world;

pub use error::ProjectionError;
pub use listener::{
    CountingListener, NullProjectionListener, ProjectionCounters, ProjectionListener,
};
pub use projection::{Issued, ProjectionConfig, SpeculativeEntry, SpeculativeProjection};
pub use runner::{ClientRunner, InboundBuffer};
pub use update::{KnownSet, TickUpdate};
pub use world::ClientWorld;

/// Crate version, for tooling banners.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("client"));
    }
}
