//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the RPC bridge gateway,
//! datastore HTTP transfers, config file access and logging setup.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod transport;
