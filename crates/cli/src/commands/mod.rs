//! Command implementations.

mod run;
mod validate;

pub use run::run_hub;
pub use validate::run_validate;
