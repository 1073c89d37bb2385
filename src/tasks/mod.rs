//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Realign: Flushes queued invalidations at a fixed interval

mod realign;

pub use realign::spawn_realign_task;
