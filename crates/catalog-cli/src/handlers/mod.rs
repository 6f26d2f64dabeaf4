//! Command handlers.

pub mod run;
pub mod status;
pub mod validate;
