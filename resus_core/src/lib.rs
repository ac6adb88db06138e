#![forbid(unsafe_code)]

//! Core domain model and timing logic for the Resus cardiac arrest assistant.
//!
//! This crate provides:
//! - Domain types (rhythms, drugs, modes, outcomes)
//! - The resuscitation engine: clock, rhythm tracker, medication due
//!   engine, banner projection, audio cue queue and undoable event log
//! - Persistence (session records, in-progress state)
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod formulary;
pub mod config;
pub mod logging;
pub mod session;
pub mod rhythm;
pub mod medication;
pub mod event_log;
pub mod alerts;
pub mod audio;
pub mod record;
pub mod engine;
pub mod sink;
pub mod state;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use formulary::{formulary, SHOCK_ENERGY_OPTIONS};
pub use config::Config;
pub use alerts::{Banner, BannerKind, BannerStatus};
pub use audio::AlertSound;
pub use engine::{Action, ActionOutcome, Engine, ProtocolSettings};
pub use event_log::{Event, EventKind};
pub use record::{SessionRecord, SessionSummary};
pub use session::format_clock;
pub use sink::{read_records, JsonlSink, RecordSink};
pub use state::StoredSession;
