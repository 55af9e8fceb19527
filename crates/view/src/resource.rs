//! Keyed store of GPU-bound resources shared by every display of one scene.
//!
//! Owned by the scene rather than being process-global so independent viewers
//! can coexist; everything is released together when the scene is dropped.
//! The key space is flat: keys must encode enough identity ("shader_solid",
//! "shader_scheme") to be unique across unrelated display kinds.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, ViewError};

#[derive(Default)]
pub struct ResourceCache {
    entries: HashMap<String, Rc<dyn Any>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the resource stored under `key`, building it on first use.
    /// The builder runs at most once per key for the cache's lifetime.
    pub fn get_or_create<T, F>(&mut self, key: &str, build: F) -> Result<Rc<T>>
    where
        T: 'static,
        F: FnOnce() -> Result<T>,
    {
        if let Some(entry) = self.entries.get(key) {
            return entry.clone().downcast::<T>().map_err(|_| {
                ViewError::invariant(format!(
                    "resource key {key:?} is already bound to a different resource type"
                ))
            });
        }
        let built: Rc<T> = Rc::new(build()?);
        self.entries.insert(key.to_string(), built.clone());
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_runs_once() {
        let mut cache = ResourceCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_create("answer", || {
                    calls += 1;
                    Ok(42_u32)
                })
                .unwrap();
            assert_eq!(*v, 42);
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn builder_error_is_not_cached() {
        let mut cache = ResourceCache::new();
        let err = cache.get_or_create::<u32, _>("broken", || {
            Err(ViewError::gl("link failed"))
        });
        assert!(err.is_err());
        // a later successful build still runs
        let v = cache.get_or_create("broken", || Ok(7_u32)).unwrap();
        assert_eq!(*v, 7);
    }

    #[test]
    fn key_collision_is_invariant_error() {
        let mut cache = ResourceCache::new();
        cache.get_or_create("tex", || Ok(1.0_f32)).unwrap();
        let err = cache.get_or_create::<u32, _>("tex", || Ok(1)).unwrap_err();
        assert!(matches!(err, ViewError::Invariant(_)));
    }
}
