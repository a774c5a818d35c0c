use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::value::{Builtin, Value};

/// Names that survive `restart()`.
pub const RESERVED_NAMES: [&str; 2] = ["restart", "tutor"];

/// Global bindings for one or more sessions. Every access takes the lock briefly.
#[derive(Clone, Debug, Default)]
pub struct Namespace(Arc<Mutex<HashMap<String, Value>>>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace for an isolated session: carries `restart` and the `tutor` handle.
    pub fn isolated(session: &str) -> Self {
        let ns = Namespace::new();
        ns.set("restart", Value::Builtin(Builtin::Restart));
        ns.set(
            "tutor",
            Value::Handle {
                session: Arc::from(session),
            },
        );
        ns
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.lock().insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Drops every binding except the reserved ones.
    pub fn restart(&self) {
        self.lock()
            .retain(|name, _| RESERVED_NAMES.contains(&name.as_str()));
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn same_as(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_keeps_reserved_names_only() {
        let ns = Namespace::isolated("p:1");
        ns.set("x", Value::Int(3));
        ns.restart();
        assert_eq!(ns.names(), vec!["restart".to_string(), "tutor".to_string()]);
    }

    #[test]
    fn clones_share_bindings() {
        let ns = Namespace::new();
        let other = ns.clone();
        other.set("a", Value::Int(1));
        assert_eq!(ns.get("a"), Some(Value::Int(1)));
        assert!(ns.same_as(&other));
        assert!(!Namespace::new().contains("restart"));
    }
}
