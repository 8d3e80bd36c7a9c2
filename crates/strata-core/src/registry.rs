//! Component type registry.
//!
//! A [`ComponentRegistry`] maps a type id (e.g. `"scale"`) to a descriptor
//! and a constructor. It is an ordinary value passed to whoever builds a
//! pipeline; crates add their types with
//! [`register()`](ComponentRegistry::register).

use crate::component::Component;
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::params::Params;

/// Broad role of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentCategory {
    /// Writes a level without reading one.
    Source,
    /// Reads levels without writing one.
    Sink,
    /// Reads and writes.
    Processor,
}

impl ComponentCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            ComponentCategory::Source => "Source",
            ComponentCategory::Sink => "Sink",
            ComponentCategory::Processor => "Processor",
        }
    }
}

/// Describes a component type.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// Type id used in pipeline files (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Role in a pipeline.
    pub category: ComponentCategory,
    /// Recognized keys of the `params` table.
    pub params: &'static [&'static str],
}

/// Everything a constructor receives.
#[derive(Debug, Clone)]
pub struct ComponentArgs {
    /// Instance name.
    pub name: String,
    /// Type id.
    pub type_name: String,
    /// Instance parameters, with `writer` and `reader` as nested tables.
    pub params: Params,
    /// Instance logger.
    pub logger: Logger,
}

impl ComponentArgs {
    /// Creates arguments with a detached logger.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, params: Params) -> Self {
        let name = name.into();
        Self {
            logger: Logger::detached(&name),
            name,
            type_name: type_name.into(),
            params,
        }
    }
}

/// Constructor signature.
pub type ComponentFactory = fn(&ComponentArgs) -> Result<Box<dyn Component>>;

struct RegistryEntry {
    descriptor: ComponentDescriptor,
    factory: ComponentFactory,
}

/// Registry of component types.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<RegistryEntry>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id))
            .finish()
    }
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type. A later registration with the same id replaces the earlier one.
    pub fn register(&mut self, descriptor: ComponentDescriptor, factory: ComponentFactory) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.descriptor.id == descriptor.id) {
            entry.descriptor = descriptor;
            entry.factory = factory;
            return;
        }
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Returns descriptors in one category.
    pub fn in_category(&self, category: ComponentCategory) -> Vec<&ComponentDescriptor> {
        self.descriptors().filter(|d| d.category == category).collect()
    }

    /// Looks up a descriptor by type id.
    pub fn get(&self, id: &str) -> Option<&ComponentDescriptor> {
        self.descriptors().find(|d| d.id == id)
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Constructs an instance of `args.type_name`.
    pub fn create(&self, args: &ComponentArgs) -> Result<Box<dyn Component>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == args.type_name)
            .ok_or_else(|| Error::UnknownComponentType(args.type_name.clone()))?;
        (entry.factory)(args)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{TickContext, TickResult, Tickable};

    struct Idle;

    impl Tickable for Idle {
        fn tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<TickResult> {
            Ok(TickResult::Inactive)
        }
    }

    impl Component for Idle {}

    fn descriptor(id: &'static str) -> ComponentDescriptor {
        ComponentDescriptor {
            id,
            name: "Idle",
            description: "does nothing",
            category: ComponentCategory::Sink,
            params: &[],
        }
    }

    #[test]
    fn create_known_type() {
        let mut reg = ComponentRegistry::new();
        reg.register(descriptor("idle"), |_| Ok(Box::new(Idle)));
        assert!(reg.contains("idle"));
        assert_eq!(reg.in_category(ComponentCategory::Sink).len(), 1);
        assert!(reg.create(&ComponentArgs::new("a", "idle", Params::new())).is_ok());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let reg = ComponentRegistry::new();
        let err = reg
            .create(&ComponentArgs::new("a", "nope", Params::new()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownComponentType(ref t) if t == "nope"));
    }

    #[test]
    fn re_registering_replaces() {
        let mut reg = ComponentRegistry::new();
        reg.register(descriptor("idle"), |_| Ok(Box::new(Idle)));
        reg.register(descriptor("idle"), |_| Ok(Box::new(Idle)));
        assert_eq!(reg.len(), 1);
    }
}
