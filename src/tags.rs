//! Bidirectional key/tag index.
//!
//! Two mirrored maps: key → tags and tag → keys. Writes keep them
//! symmetric, and a tag whose last key disappears is dropped on the spot,
//! so the reverse map never holds empty sets.

use std::collections::{HashMap, HashSet};

/// Delta between an entry's old and new tag sets: `(removed, added)`.
///
/// Relinking applies only this delta, so the cost of an overwrite is
/// proportional to how much the tag set actually changed.
pub(crate) fn tag_diff(
    old: &HashSet<String>,
    new: &HashSet<String>,
) -> (Vec<String>, Vec<String>) {
    let removed = old.difference(new).cloned().collect();
    let added = new.difference(old).cloned().collect();
    (removed, added)
}

/// In-process tag index.
///
/// Not internally locked: the owning store provides exclusion, so that index
/// updates and value updates land under the same lock.
#[derive(Debug, Default)]
pub struct TagIndex {
    /// Key to tags mapping
    key_tags: HashMap<String, HashSet<String>>,

    /// Tag to keys mapping
    tag_keys: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `key`'s tag set with `tags`.
    ///
    /// The previous set is not merged with the new one: tags no longer listed
    /// are unlinked, newly listed ones are linked, and the reverse map is
    /// touched only for that delta. Duplicate tags in the input collapse.
    pub fn assign(&mut self, key: &str, tags: &[&str]) {
        let new: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
        let old = self.key_tags.get(key).cloned().unwrap_or_default();
        let (removed, added) = tag_diff(&old, &new);

        for tag in &removed {
            if let Some(keys) = self.tag_keys.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_keys.remove(tag);
                }
            }
        }

        for tag in added {
            self.tag_keys.entry(tag).or_default().insert(key.to_string());
        }

        if new.is_empty() {
            self.key_tags.remove(key);
        } else {
            self.key_tags.insert(key.to_string(), new);
        }
    }

    /// Unlink `key` from every tag it carries and return those tags.
    ///
    /// Unknown keys are a no-op yielding an empty set, so this is safe to
    /// call again for a key that was already unlinked.
    pub fn unassign(&mut self, key: &str) -> HashSet<String> {
        let Some(tags) = self.key_tags.remove(key) else {
            return HashSet::new();
        };

        for tag in &tags {
            if let Some(keys) = self.tag_keys.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_keys.remove(tag);
                }
            }
        }

        tags
    }

    /// Keys currently carrying `tag`. Unknown tags yield an empty set.
    pub fn keys_for(&self, tag: &str) -> HashSet<String> {
        self.tag_keys.get(tag).cloned().unwrap_or_default()
    }

    /// Tags currently carried by `key`. Untagged keys yield an empty set.
    pub fn tags_for(&self, key: &str) -> HashSet<String> {
        self.key_tags.get(key).cloned().unwrap_or_default()
    }

    /// Number of tags with at least one key.
    pub fn tag_count(&self) -> usize {
        self.tag_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tag_diff() {
        let old = set(&["a", "b", "c"]);
        let new = set(&["b", "c", "d"]);

        let (mut removed, mut added) = tag_diff(&old, &new);
        removed.sort();
        added.sort();

        assert_eq!(removed, vec!["a".to_string()]);
        assert_eq!(added, vec!["d".to_string()]);
    }

    #[test]
    fn test_tag_diff_disjoint() {
        let (removed, added) = tag_diff(&set(&["a"]), &set(&["b"]));
        assert_eq!(removed, vec!["a".to_string()]);
        assert_eq!(added, vec!["b".to_string()]);
    }

    #[test]
    fn test_assign_links_both_directions() {
        let mut index = TagIndex::new();
        index.assign("user:1", &["users", "active"]);

        assert_eq!(index.tags_for("user:1"), set(&["users", "active"]));
        assert_eq!(index.keys_for("users"), set(&["user:1"]));
        assert_eq!(index.keys_for("active"), set(&["user:1"]));
    }

    #[test]
    fn test_assign_replaces_previous_tags() {
        let mut index = TagIndex::new();
        index.assign("key", &["a", "b"]);
        index.assign("key", &["b", "c"]);

        assert_eq!(index.tags_for("key"), set(&["b", "c"]));
        assert!(index.keys_for("a").is_empty());
        assert_eq!(index.keys_for("c"), set(&["key"]));
    }

    #[test]
    fn test_assign_empty_clears_associations() {
        let mut index = TagIndex::new();
        index.assign("key", &["a", "b"]);
        index.assign("key", &[]);

        assert!(index.tags_for("key").is_empty());
        assert!(index.keys_for("a").is_empty());
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn test_assign_deduplicates_input() {
        let mut index = TagIndex::new();
        index.assign("key", &["a", "a", "b"]);

        assert_eq!(index.tags_for("key").len(), 2);
    }

    #[test]
    fn test_empty_tags_are_dropped() {
        let mut index = TagIndex::new();
        index.assign("k1", &["shared", "only-k1"]);
        index.assign("k2", &["shared"]);

        index.unassign("k1");
        assert!(index.keys_for("only-k1").is_empty());
        assert_eq!(index.keys_for("shared"), set(&["k2"]));

        index.unassign("k2");
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn test_unassign_returns_old_tags() {
        let mut index = TagIndex::new();
        index.assign("key", &["a", "b"]);

        assert_eq!(index.unassign("key"), set(&["a", "b"]));
    }

    #[test]
    fn test_unassign_is_idempotent() {
        let mut index = TagIndex::new();
        index.assign("key", &["a"]);

        assert_eq!(index.unassign("key"), set(&["a"]));
        assert!(index.unassign("key").is_empty());
        assert!(index.unassign("never-existed").is_empty());
    }

    #[test]
    fn test_unknown_tag_is_empty_not_error() {
        let index = TagIndex::new();
        assert!(index.keys_for("nope").is_empty());
    }
}
