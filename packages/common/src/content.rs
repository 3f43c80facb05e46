use std::sync::{Arc, RwLock};

/// Shared handle to the latest document content
///
/// Every edit writes here synchronously. Anything that reads "current"
/// content after an await (autosave ticks, AI suggestions) must read
/// through the cell rather than a copy taken earlier.
#[derive(Debug, Clone, Default)]
pub struct ContentCell {
    inner: Arc<RwLock<String>>,
}

impl ContentCell {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(content.into())),
        }
    }

    /// Clone out the current content
    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set(&self, content: impl Into<String>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = content.into();
    }

    /// Compare without cloning
    pub fn matches(&self, other: &str) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).as_str() == other
    }

    /// Run `f` against the content under the read lock
    pub fn with<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(self.inner.read().unwrap_or_else(|e| e.into_inner()).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_observe_writes() {
        let cell = ContentCell::new("# Initial");
        let reader = cell.clone();
        cell.set("# Changed");
        assert_eq!(reader.get(), "# Changed");
        assert!(reader.matches("# Changed"));
    }
}
