use std::collections::HashMap;

use mlua::Function;

use crate::context::ContextId;
use crate::value::HostRef;

/// Script function reachable from the host through a closure key
#[derive(Debug, Clone)]
pub struct ConvertedFunction {
    pub context: ContextId,
    pub function: Function,
}

/// Host closure keys mapped to the script functions they call back into
#[derive(Debug, Default)]
pub struct ConvertedFunctions {
    entries: HashMap<HostRef, ConvertedFunction>,
}

impl ConvertedFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: HostRef, context: ContextId, function: Function) {
        self.entries
            .insert(key, ConvertedFunction { context, function });
    }

    pub fn get(&self, key: HostRef) -> Option<ConvertedFunction> {
        self.entries.get(&key).cloned()
    }

    /// Forget a key whose host memory is being released or reused
    pub fn remove(&mut self, key: HostRef) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Forget every entry owned by `context`
    pub fn purge_context(&mut self, context: ContextId) {
        self.entries.retain(|_, entry| entry.context != context);
    }

    /// Key already registered for this exact script function, if any
    pub fn key_of(&self, context: ContextId, function: &Function) -> Option<HostRef> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.context == context && entry.function == *function)
            .map(|(key, _)| *key)
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
