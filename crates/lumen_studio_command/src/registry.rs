// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command descriptors and the name-keyed registry.

use crate::command::Command;
use crate::input::{CommandInput, Modifiers, PointerButtons};
use indexmap::IndexMap;

/// The input shape that triggers a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trigger {
    /// Required pointer buttons
    pub buttons: PointerButtons,
    /// Required modifier keys
    pub modifiers: Modifiers,
    /// Required key code, if any
    pub key: Option<u32>,
    /// Whether a double click is required
    pub double_click: bool,
}

impl Trigger {
    /// Trigger on a pointer press
    pub fn pointer(buttons: PointerButtons, modifiers: Modifiers) -> Self {
        Self {
            buttons,
            modifiers,
            ..Self::default()
        }
    }

    /// Trigger on a key press
    pub fn key(key: u32, modifiers: Modifiers) -> Self {
        Self {
            key: Some(key),
            modifiers,
            ..Self::default()
        }
    }

    /// Require a double click
    pub fn double_click(mut self) -> Self {
        self.double_click = true;
        self
    }

    /// Whether an input matches every field of this trigger
    pub fn matches(&self, input: &CommandInput) -> bool {
        self.buttons == input.buttons
            && self.modifiers == input.modifiers
            && self.key == input.key
            && self.double_click == input.double_click
    }
}

/// Factory producing a fresh command instance per invocation
pub type CommandFactory<Ctx> = fn() -> Box<dyn Command<Ctx>>;

/// A registered command: its trigger and how to build it
pub struct CommandDescriptor<Ctx> {
    /// Unique command identifier
    pub name: String,
    /// Dispatch category (e.g. "graph_editor", "view_3d")
    pub category: String,
    /// Input shape that selects this command
    pub trigger: Trigger,
    /// Default metadata handed to the command, if any
    pub metadata: Option<String>,
    /// Instance factory
    pub factory: CommandFactory<Ctx>,
}

impl<Ctx> CommandDescriptor<Ctx> {
    /// Create a new descriptor
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        trigger: Trigger,
        factory: CommandFactory<Ctx>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            trigger,
            metadata: None,
            factory,
        }
    }

    /// Attach default metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Registry of command descriptors, keyed by name.
///
/// Registration order is kept and is the tie-break for trigger lookup:
/// when several descriptors of a category match an input, the first one
/// registered wins. Re-registering a name replaces its descriptor.
pub struct CommandRegistry<Ctx> {
    descriptors: IndexMap<String, CommandDescriptor<Ctx>>,
}

impl<Ctx> CommandRegistry<Ctx> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            descriptors: IndexMap::new(),
        }
    }

    /// Register a descriptor, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: CommandDescriptor<Ctx>) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    /// Get a descriptor by name
    pub fn descriptor(&self, name: &str) -> Option<&CommandDescriptor<Ctx>> {
        self.descriptors.get(name)
    }

    /// Build a command instance by name; callers must handle `None`
    pub fn create(&self, name: &str) -> Option<Box<dyn Command<Ctx>>> {
        self.descriptors.get(name).map(|d| (d.factory)())
    }

    /// Find the command a category/input pair triggers.
    ///
    /// Scans descriptors of `category` in registration order; on a match,
    /// writes the descriptor's name into `input.matched_command` (and its
    /// default metadata into an input that carries none) and returns a
    /// fresh instance.
    pub fn find(
        &self,
        category: &str,
        input: &mut CommandInput,
    ) -> Option<Box<dyn Command<Ctx>>> {
        let descriptor = self
            .descriptors
            .values()
            .find(|d| d.category == category && d.trigger.matches(input))?;

        input.matched_command = Some(descriptor.name.clone());
        if input.metadata.is_empty() {
            if let Some(metadata) = &descriptor.metadata {
                input.metadata = metadata.clone();
            }
        }
        Some((descriptor.factory)())
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor<Ctx>> {
        self.descriptors.values()
    }
}

impl<Ctx> Default for CommandRegistry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
