use places_settings::{KeyValueStore, StateStoreError};
use serde_json::Value;
use tracing::{debug, warn};

use crate::resource::ResourceId;

/// Expanded node set, mirrored to a key-value store as a JSON array of ids.
/// 展開中的節點集合，以 JSON 陣列保存於鍵值存放區。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionState {
    key: String,
    expanded: Vec<ResourceId>,
}

impl ExpansionState {
    /// Reads the persisted set; a missing or malformed entry yields an empty set.
    pub fn load<S>(store: &S, key: impl Into<String>) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let key = key.into();
        let expanded = read_ids(store, &key);
        Self { key, expanded }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ids(&self) -> &[ResourceId] {
        &self.expanded
    }

    pub fn is_expanded(&self, id: ResourceId) -> bool {
        self.expanded.contains(&id)
    }

    /// Expands or collapses `id`, persisting only when the set changed.
    pub fn set<S>(&mut self, store: &mut S, id: ResourceId, expanded: bool) -> Result<bool, StateStoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let present = self.is_expanded(id);
        if present == expanded {
            return Ok(false);
        }
        if expanded {
            self.expanded.push(id);
        } else {
            self.expanded.retain(|existing| *existing != id);
        }
        self.persist(store)?;
        Ok(true)
    }

    /// Expands every id in `ids` with a single write.
    pub fn extend<S>(&mut self, store: &mut S, ids: &[ResourceId]) -> Result<(), StateStoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let before = self.expanded.len();
        for id in ids {
            if !self.expanded.contains(id) {
                self.expanded.push(*id);
            }
        }
        if self.expanded.len() != before {
            self.persist(store)?;
        }
        Ok(())
    }

    /// Replaces the persisted set wholesale.
    /// 整批覆寫已保存的展開集合。
    pub fn replace<S>(&mut self, store: &mut S, ids: &[ResourceId]) -> Result<(), StateStoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        self.expanded = ids.to_vec();
        self.persist(store)
    }

    pub fn clear<S>(&mut self, store: &mut S) -> Result<(), StateStoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        self.replace(store, &[])
    }

    /// Discards the in-memory set and re-reads it from the store.
    pub fn reload<S>(&mut self, store: &S)
    where
        S: KeyValueStore + ?Sized,
    {
        self.expanded = read_ids(store, &self.key);
    }

    fn persist<S>(&self, store: &mut S) -> Result<(), StateStoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let value = Value::Array(
            self.expanded
                .iter()
                .map(|id| Value::from(id.as_u64()))
                .collect(),
        );
        store.set_value(&self.key, value)?;
        debug!(key = %self.key, expanded = self.expanded.len(), "persisted expansion state");
        Ok(())
    }
}

fn read_ids<S>(store: &S, key: &str) -> Vec<ResourceId>
where
    S: KeyValueStore + ?Sized,
{
    match store.value(key) {
        None => Vec::new(),
        Some(value) => match serde_json::from_value::<Vec<ResourceId>>(value.clone()) {
            Ok(ids) => ids,
            Err(error) => {
                warn!(key, %error, "ignoring malformed expansion state");
                Vec::new()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use places_settings::MemoryStateStore;
    use serde_json::json;

    const KEY: &str = "places.tree.expanded";

    #[test]
    fn restores_persisted_ids() {
        let store = MemoryStateStore::with_value(KEY, json!([7, 3]));
        let state = ExpansionState::load(&store, KEY);
        assert_eq!(
            state.ids(),
            &[ResourceId::from_raw(7), ResourceId::from_raw(3)]
        );
    }

    #[test]
    fn malformed_entry_starts_empty() {
        let store = MemoryStateStore::with_value(KEY, json!({"not": "a list"}));
        let state = ExpansionState::load(&store, KEY);
        assert!(state.ids().is_empty());
    }

    #[test]
    fn toggling_writes_only_on_change() {
        let mut store = MemoryStateStore::new();
        let mut state = ExpansionState::load(&store, KEY);
        let id = ResourceId::from_raw(42);

        assert!(state.set(&mut store, id, true).unwrap());
        assert!(!state.set(&mut store, id, true).unwrap());
        assert_eq!(store.writes(), 1);
        assert_eq!(store.value(KEY), Some(&json!([42])));

        assert!(state.set(&mut store, id, false).unwrap());
        assert_eq!(store.value(KEY), Some(&json!([])));
    }

    #[test]
    fn replace_overwrites_instead_of_merging() {
        let mut store = MemoryStateStore::with_value(KEY, json!([1, 2]));
        let mut state = ExpansionState::load(&store, KEY);
        state
            .replace(&mut store, &[ResourceId::from_raw(9)])
            .unwrap();
        assert_eq!(store.value(KEY), Some(&json!([9])));

        state.reload(&store);
        assert_eq!(state.ids(), &[ResourceId::from_raw(9)]);
    }
}
