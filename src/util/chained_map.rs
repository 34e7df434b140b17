//! An ordered chain of scope frames, innermost-first lookup.
//!
//! Used both by the frontend symbol table (key = source identifier, value =
//! [`crate::front::sema::FrontendEntry`]) and by the Eeyore lowering symbol
//! table (value = [`crate::eeyore::symtab::EeyoreEntry`]).

use crate::common::Map;

/// A chained scope map: each `push` opens a new innermost frame, each `pop`
/// drops it (and every entry it owns). Lookup walks frames innermost-first
/// and returns the first match.
pub struct ChainedMap<K, V> {
    frames: Vec<Map<K, V>>,
}

impl<K: Ord + Clone, V> ChainedMap<K, V> {
    pub fn new() -> Self {
        ChainedMap {
            frames: vec![Map::new()],
        }
    }

    /// Open a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(Map::new());
    }

    /// Drop the innermost frame and every entry it owns.
    pub fn pop(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the outermost frame");
    }

    /// Insert into the innermost frame. Returns `false` (and does not
    /// insert) if the innermost frame already has this key.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let frame = self.frames.last_mut().expect("no open frame");
        if frame.contains_key(&key) {
            return false;
        }
        frame.insert(key, value);
        true
    }

    /// Look up a key, innermost frame first.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.frames.iter().rev().find_map(|frame| frame.get(key))
    }

    /// Is this key bound in the innermost frame specifically?
    pub fn defined_in_innermost(&self, key: &K) -> bool {
        self.frames
            .last()
            .map(|frame| frame.contains_key(key))
            .unwrap_or(false)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<K: Ord + Clone, V> Default for ChainedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_shadows_outer() {
        let mut m: ChainedMap<&str, i32> = ChainedMap::new();
        m.insert("x", 1);
        m.push();
        m.insert("x", 2);
        assert_eq!(m.get(&"x"), Some(&2));
        m.pop();
        assert_eq!(m.get(&"x"), Some(&1));
    }

    #[test]
    fn duplicate_in_frame_rejected() {
        let mut m: ChainedMap<&str, i32> = ChainedMap::new();
        assert!(m.insert("x", 1));
        assert!(!m.insert("x", 2));
        assert_eq!(m.get(&"x"), Some(&1));
    }

    #[test]
    fn pop_drops_entries() {
        let mut m: ChainedMap<&str, i32> = ChainedMap::new();
        m.push();
        m.insert("y", 1);
        m.pop();
        assert_eq!(m.get(&"y"), None);
    }
}
