//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: purges expired records from the in-memory backend

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_configured_cleanup_task};
