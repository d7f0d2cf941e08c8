//! Domain layer for the cluster coordination & async-write fabric.
//!
//! This module contains core business logic and domain models, framework
//! and infrastructure agnostic.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    AckStoreError, BusError, CleanerError, ConfigError, EventStoreError, IdentityError, SinkError,
    WriterError,
};
