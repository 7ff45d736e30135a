use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::BindError;
use crate::model::XdmNode;
use crate::module::{ExtensionModule, ModuleDescriptor};

type Key = (TypeId, TypeId);
type Map = HashMap<Key, Arc<dyn Any + Send + Sync>>;

/// Cache of module descriptors keyed by module type (and node type).
///
/// Descriptors are built on first request. Two threads asking for the same module
/// at once may both build it; the descriptors are equivalent and the last write wins.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<Map>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("len", &self.len())
            .finish()
    }
}

fn key<M: 'static, N: 'static>() -> Key {
    (TypeId::of::<M>(), TypeId::of::<N>())
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Map> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Descriptor of `M`, built via [`ExtensionModule::describe`] when not cached.
    pub fn describe<M, N>(&self) -> Result<Arc<ModuleDescriptor<M, N>>, BindError>
    where
        M: ExtensionModule<N>,
        N: XdmNode,
    {
        if let Some(found) = self.get::<M, N>() {
            return Ok(found);
        }
        let described = Arc::new(M::describe()?);
        self.write().insert(
            key::<M, N>(),
            described.clone() as Arc<dyn Any + Send + Sync>,
        );
        Ok(described)
    }

    pub fn get<M, N>(&self) -> Option<Arc<ModuleDescriptor<M, N>>>
    where
        M: Send + Sync + 'static,
        N: XdmNode,
    {
        self.read()
            .get(&key::<M, N>())
            .cloned()
            .and_then(|any| any.downcast::<ModuleDescriptor<M, N>>().ok())
    }

    pub fn remove<M, N>(&self) -> bool
    where
        M: 'static,
        N: 'static,
    {
        self.write().remove(&key::<M, N>()).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
