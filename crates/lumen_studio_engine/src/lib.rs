// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation engine for Lumen Studio.
//!
//! This crate drives the dataflow graph the `lumen_studio_graph` crate
//! models:
//! - The operator capability and its type registry
//! - Pull-based evaluation with per-node memoization and timing
//! - The scheduler running plans inline or on the background worker
//! - Cross-thread completion notices and observer events
//! - The session and engine context owning the process-wide services
//! - Built-in graph editor commands with undo history
//!
//! ## Threading
//!
//! One thread owns the [`context::EngineContext`] and with it all graph
//! mutation. The single evaluation worker takes the project mutex for the
//! duration of a plan; computed results cross back through per-entity
//! `RwLock` slots and the notifier channel.

pub mod commands;
pub mod context;
pub mod eval;
pub mod event;
pub mod history;
pub mod notifier;
pub mod operator;
pub mod project;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod value;

pub use context::EngineContext;
pub use eval::{EvalError, InterruptFlag, OperatorContext, ValueCache};
pub use event::EventMask;
pub use notifier::{EngineNotice, EventQueue, Notifier};
pub use operator::{Operator, OperatorRegistry, OperatorStatus, OperatorType};
pub use project::Project;
pub use scheduler::{EvalReason, Plan, Scheduler};
pub use session::Session;
pub use settings::ProjectSettings;
pub use value::{ImageData, Value};

/// Initialize tracing with an environment-driven filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lumen_studio_engine=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
