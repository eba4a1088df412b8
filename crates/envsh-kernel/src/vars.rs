//! The variable-store seam.
//!
//! The engine never touches process-global state: callers inject any
//! mapping that implements [`Vars`]. Plain std maps work out of the box.

use std::collections::{BTreeMap, HashMap};

/// A mutable environment-like mapping.
pub trait Vars {
    /// Current value, if the variable is set. An empty string is a set,
    /// null value — the `${NAME:-}` family tells the two apart.
    fn get(&self, key: &str) -> Option<String>;

    /// Whether the variable is set at all.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set or overwrite a variable.
    fn set(&mut self, key: &str, value: &str);

    /// Unset a variable. Loading `KEY=` (empty raw value) removes the key.
    fn remove(&mut self, key: &str);
}

impl Vars for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        HashMap::remove(self, key);
    }
}

impl Vars for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        BTreeMap::remove(self, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashmap_roundtrip() {
        let mut vars = HashMap::new();
        assert!(!Vars::contains(&vars, "A"));
        vars.set("A", "1");
        assert_eq!(Vars::get(&vars, "A"), Some("1".to_string()));
        Vars::remove(&mut vars, "A");
        assert!(Vars::get(&vars, "A").is_none());
    }

    #[test]
    fn empty_value_is_set_but_null() {
        let mut vars = BTreeMap::new();
        vars.set("NULL", "");
        assert!(Vars::contains(&vars, "NULL"));
        assert_eq!(Vars::get(&vars, "NULL"), Some(String::new()));
    }
}
