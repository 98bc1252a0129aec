//! Name -> factory table for projection families.
//!
//! The registry knows nothing about individual families. Each factory call
//! must produce an independent instance; nothing is shared between instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::projection::Projection;

pub type ProjectionFactory = Arc<dyn Fn() -> Box<dyn Projection> + Send + Sync>;

/// Ids are kept sorted, so `list` is deterministic for a given set of entries.
#[derive(Clone, Default)]
pub struct ProjectionRegistry {
    factories: BTreeMap<String, ProjectionFactory>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `factory` under `id`, replacing any previous entry.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Projection> + Send + Sync + 'static,
    {
        self.register_factory(id, Arc::new(factory));
    }

    pub fn register_factory(&mut self, id: impl Into<String>, factory: ProjectionFactory) {
        let id = id.into();
        if self.factories.insert(id.clone(), factory).is_some() {
            tracing::debug!(id = %id, "replaced projection factory");
        }
    }

    pub fn register_all<I, S>(&mut self, factories: I)
    where
        I: IntoIterator<Item = (S, ProjectionFactory)>,
        S: Into<String>,
    {
        for (id, factory) in factories {
            self.register_factory(id, factory);
        }
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.factories.remove(id).is_some()
    }

    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn has(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Fresh instance from the factory registered under `id`.
    pub fn create(&self, id: &str) -> Option<Box<dyn Projection>> {
        self.factories.get(id).map(|factory| factory())
    }
}

impl fmt::Debug for ProjectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionRegistry")
            .field("ids", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectionFactory, ProjectionRegistry};
    use crate::projection::{Capability, Projection};
    use std::sync::Arc;

    #[derive(Default)]
    struct Scaled {
        scale: f64,
    }

    impl Projection for Scaled {
        fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
            Some([lon * self.scale, -lat * self.scale])
        }
        fn supports(&self, capability: Capability) -> bool {
            capability == Capability::Scale
        }
        fn scale(&self) -> Option<f64> {
            Some(self.scale)
        }
        fn set_scale(&mut self, scale: f64) {
            self.scale = scale;
        }
    }

    fn scaled() -> Box<dyn Projection> {
        Box::new(Scaled { scale: 1.0 })
    }

    #[test]
    fn register_has_unregister() {
        let mut registry = ProjectionRegistry::new();
        assert!(!registry.has("plate"));
        registry.register("plate", scaled);
        assert!(registry.has("plate"));
        assert_eq!(registry.list(), vec!["plate".to_string()]);
        assert!(registry.unregister("plate"));
        assert!(!registry.unregister("plate"));
        assert!(registry.is_empty());
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let mut registry = ProjectionRegistry::new();
        registry.register("p", scaled);
        registry.register("p", || Box::new(Scaled { scale: 7.0 }) as Box<dyn Projection>);
        assert_eq!(registry.len(), 1);
        let p = registry.create("p").expect("registered");
        assert_eq!(p.scale(), Some(7.0));
    }

    #[test]
    fn factory_instances_are_independent() {
        let mut registry = ProjectionRegistry::new();
        registry.register("p", scaled);
        let mut a = registry.create("p").expect("a");
        let b = registry.create("p").expect("b");
        a.set_scale(42.0);
        assert_eq!(a.scale(), Some(42.0));
        assert_eq!(b.scale(), Some(1.0));
    }

    #[test]
    fn list_is_deterministic_and_clear_empties() {
        let mut registry = ProjectionRegistry::new();
        let f: ProjectionFactory = Arc::new(scaled);
        registry.register_all([
            ("zeta", Arc::clone(&f)),
            ("alpha", Arc::clone(&f)),
            ("mid", f),
        ]);
        assert_eq!(registry.list(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.list(), registry.list());
        registry.clear();
        assert!(registry.list().is_empty());
        assert!(registry.create("alpha").is_none());
    }
}
