//! # Contracts
//!
//! Frozen interface contracts shared by every sockethub crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - `ConnectionId` is the stable handle of one established socket (also its poll token)
//! - `PeerAddr` is the derived `(address, port)` identity reported in logs and stats

mod config;
mod error;
mod peer;
mod sink;

pub use config::*;
pub use error::*;
pub use peer::*;
pub use sink::*;
