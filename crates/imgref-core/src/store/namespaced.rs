use super::{Result, Store};

/// Scopes every key under `"{namespace}_"`, letting several users or profiles
/// keep separate indexes in one backing store.
pub struct NamespacedStore<S> {
    namespace: String,
    inner: S,
}

impl<S: Store> NamespacedStore<S> {
    pub fn new(namespace: impl Into<String>, inner: S) -> Self {
        Self {
            namespace: namespace.into(),
            inner,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }
}

impl<S: Store> Store for NamespacedStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(&self.scoped(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(&self.scoped(key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(&self.scoped(key))
    }
}
