use std::sync::Arc;

use dashmap::DashMap;
use interactor_core::ServiceClass;
use parking_lot::RwLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// ClassCatalog
// ---------------------------------------------------------------------------

/// Name-to-class lookup used to resolve queued jobs back into service classes.
///
/// Jobs carry only the class name, so every class that may be called
/// asynchronously must be registered here before a worker picks up its jobs.
pub struct ClassCatalog {
    by_name: DashMap<String, Arc<ServiceClass>>,
    /// Registration order, for deterministic listing.
    order: RwLock<Vec<String>>,
}

impl ClassCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers `class` under its name, returning the class it replaced.
    pub fn register(&self, class: Arc<ServiceClass>) -> Option<Arc<ServiceClass>> {
        let name = class.name().to_string();
        let previous = self.by_name.insert(name.clone(), class);
        if previous.is_none() {
            self.order.write().push(name.clone());
        }
        debug!(class = %name, replaced = previous.is_some(), "service class registered");
        previous
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<ServiceClass>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered class names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use interactor_core::Value;

    use super::*;

    fn class(name: &str) -> Arc<ServiceClass> {
        ServiceClass::define(name, |d| {
            d.perform(|_| Ok(Value::Null));
        })
        .unwrap()
    }

    #[test]
    fn resolves_registered_classes_by_name() {
        let catalog = ClassCatalog::new();
        assert!(catalog.is_empty());
        catalog.register(class("Signup"));
        catalog.register(class("Charge"));

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("Signup"));
        assert_eq!(catalog.resolve("Charge").unwrap().name(), "Charge");
        assert!(catalog.resolve("Missing").is_none());
        assert_eq!(catalog.names(), vec!["Signup".to_string(), "Charge".to_string()]);
    }

    #[test]
    fn re_registering_replaces_without_duplicating_order() {
        let catalog = ClassCatalog::new();
        let first = class("Signup");
        assert!(catalog.register(first.clone()).is_none());
        let replaced = catalog.register(class("Signup")).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(catalog.names().len(), 1);
    }
}
