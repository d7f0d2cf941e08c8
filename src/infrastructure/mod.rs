//! Infrastructure layer: configuration loading and structured logging
//! (SPEC_FULL §10, §11). Storage adapters live under `adapters::sqlite`
//! instead — this module holds only the cross-cutting ambient concerns.

pub mod config;
pub mod logging;
