//! The category prototype store.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::classification::Category;

/// Ordered, name-keyed set of categories behind a reader/writer lock.
///
/// Registration order is preserved; replacing a category keeps its slot.
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    categories: RwLock<Vec<Category>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Category>> {
        self.categories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Category>> {
        self.categories.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace by name. Returns `true` when an entry was replaced.
    pub fn upsert(&self, category: Category) -> bool {
        let mut categories = self.write();
        match categories.iter_mut().find(|c| c.name == category.name) {
            Some(slot) => {
                *slot = category;
                true
            }
            None => {
                categories.push(category);
                false
            }
        }
    }

    /// Remove a category. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut categories = self.write();
        let before = categories.len();
        categories.retain(|c| c.name != name);
        categories.len() != before
    }

    /// Drop every category.
    pub fn reset(&self) {
        self.write().clear();
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of exemplar vectors stored for `name`.
    pub fn exemplar_count(&self, name: &str) -> Option<usize> {
        self.read()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.exemplars.len())
    }

    /// Run `f` over the categories while holding the read lock.
    pub fn with_categories<R>(&self, f: impl FnOnce(&[Category]) -> R) -> R {
        f(&self.read())
    }
}
