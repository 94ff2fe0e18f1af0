//! Unit tests for the vmops CLI
//!
//! Workflows run against an in-memory endpoint with a paused clock, so they
//! are fast and need no external I/O.

mod destroy;
mod mocks;
mod task_waiter;
