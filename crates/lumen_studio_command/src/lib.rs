// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command dispatch for Lumen Studio.
//!
//! This crate provides the command layer the UI drives:
//! - Command descriptors with input triggers, keyed by name
//! - A factory registry building one ephemeral instance per invocation
//! - The modal responder state machine owning at most one active command
//!
//! The crate is generic over the application context, so it carries no
//! engine dependency and is reused by every editor surface.

pub mod command;
pub mod input;
pub mod registry;
pub mod responder;

pub use command::{Command, ExecutionStatus};
pub use input::{CommandInput, Modifiers, PointerButtons};
pub use registry::{CommandDescriptor, CommandFactory, CommandRegistry, Trigger};
pub use responder::{CommandResponder, DispatchError};
