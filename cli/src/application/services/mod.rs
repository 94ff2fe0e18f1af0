//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod config_service;
pub mod datastore;
pub mod inventory;
pub mod network;
pub mod session;
pub mod task_waiter;
pub mod vm;
pub mod volume;
