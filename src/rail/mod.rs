//! Cami Money financial-rail demo console.
//!
//! Escrow holds, exchanges and settlements on the rail service, reached
//! through the `/api/cami_money` proxy. Amounts on the wire are in rail
//! units: cents for fiat, sats for BTC, kilograms for carbon.

mod client;
mod types;

pub use client::*;
pub use types::*;
