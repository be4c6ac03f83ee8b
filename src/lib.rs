#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod loops;
pub mod policy;
pub mod promises;
pub mod store;
pub mod sweep;
pub mod threads;
pub mod topic;
pub mod types;
mod user_locks;

pub use config::{Config, EngagementConfig};
pub use error::{EngageError, Result};
pub use loops::OpenLoopTracker;
pub use policy::{
    IdleAction, IdleBreakerAction, PolicyInputs, PolicyThresholds, determine_idle_breaker_action,
    generate_input_topic,
};
pub use promises::{PendingMessageSink, PromiseLedger};
pub use store::EngagementStore;
pub use threads::{ThreadJournal, select_proactive_thread};
