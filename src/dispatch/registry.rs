//! Ordered handler registry

use serde_json::Value;

use crate::types::UpdateKey;

/// Callback receiving the payload of one update key
pub type Handler = Box<dyn FnMut(&Value) + Send>;

/// Update key → handler, kept as an explicit sequence.
///
/// Registration order is dispatch order.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(UpdateKey, Handler)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn on<F>(mut self, key: impl Into<UpdateKey>, handler: F) -> Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.register(key, handler);
        self
    }

    /// Register a handler.
    ///
    /// Re-registering a key swaps the callback and keeps the key's position.
    pub fn register<F>(&mut self, key: impl Into<UpdateKey>, handler: F) -> &mut Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = Box::new(handler),
            None => self.entries.push((key, Box::new(handler))),
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Keys in dispatch order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn handler_mut(&mut self, key: &str) -> Option<&mut Handler> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, handler)| handler)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Handler)> {
        self.entries.iter_mut().map(|(k, h)| (k.as_str(), h))
    }

    /// Get the number of registered handlers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_is_kept() {
        let registry = HandlerRegistry::new()
            .on("example", |_| {})
            .on("codebases", |_| {})
            .on("builder0", |_| {});

        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["example", "codebases", "builder0"]);
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut registry = HandlerRegistry::new();
        registry.register("a", |_| {});
        registry.register("b", |_| {});
        registry.register("a", |_| {});

        assert_eq!(registry.len(), 2);
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
