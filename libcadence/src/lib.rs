//! Cadence - scheduled multi-platform publishing
//!
//! Generated posts are held behind an approval gate, published to several
//! social platforms at once with per-platform retries, and produced daily
//! from weekly and monthly recurring schedules.

pub mod config;
pub mod db;
pub mod error;
pub mod expander;
pub mod gate;
pub mod generator;
pub mod lifecycle;
pub mod logging;
pub mod plan;
pub mod platforms;
pub mod publisher;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CadenceError, Result};
pub use scheduler::{PassReport, Scheduler, SchedulerContext};
pub use service::CadenceService;
pub use types::{
    ImageBundle, Platform, PlatformResult, Post, PostStatus, Schedule, ScheduleKind, ScheduleType,
    Tone,
};
