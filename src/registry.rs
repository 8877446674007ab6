//! Session registry
//!
//! Two-way mapping between admitted connections and their usernames.
//! Both directions are updated together on every mutation.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::AppError;
use crate::types::{ClientId, Username};

/// Connection ↔ username directory
///
/// `by_client` keeps insertion order, which is the order used for
/// listings and broadcast delivery. A rename keeps the connection's slot.
#[derive(Debug, Default)]
pub struct Registry {
    by_client: IndexMap<ClientId, Username>,
    by_name: HashMap<Username, ClientId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection under `name`
    pub fn register(&mut self, client_id: ClientId, name: Username) -> Result<(), AppError> {
        if self.by_name.contains_key(&name) {
            return Err(AppError::NameTaken(name.to_string()));
        }
        if self.by_client.contains_key(&client_id) {
            return Err(AppError::Internal(format!(
                "client {} registered twice",
                client_id
            )));
        }
        self.by_name.insert(name.clone(), client_id);
        self.by_client.insert(client_id, name);
        Ok(())
    }

    /// Remove a connection, returning the name it held
    pub fn unregister(&mut self, client_id: ClientId) -> Option<Username> {
        let name = self.by_client.shift_remove(&client_id)?;
        self.by_name.remove(&name);
        Some(name)
    }

    /// Change a connection's name, returning the previous one
    pub fn rename(&mut self, client_id: ClientId, new_name: Username) -> Result<Username, AppError> {
        if self.by_name.contains_key(&new_name) {
            return Err(AppError::NameTaken(new_name.to_string()));
        }
        let slot = self
            .by_client
            .get_mut(&client_id)
            .ok_or(AppError::UnknownClient(client_id))?;
        let old_name = std::mem::replace(slot, new_name.clone());
        if self.by_name.remove(&old_name).is_none() {
            return Err(AppError::Internal(format!(
                "name {} missing from reverse index",
                old_name
            )));
        }
        self.by_name.insert(new_name, client_id);
        Ok(old_name)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<ClientId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, client_id: ClientId) -> Option<&Username> {
        self.by_client.get(&client_id)
    }

    /// Usernames in insertion order
    pub fn snapshot(&self) -> Vec<Username> {
        self.by_client.values().cloned().collect()
    }

    /// Registered connections in insertion order
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.by_client.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        let alice = ClientId::new();

        registry.register(alice, name("alice")).unwrap();

        assert_eq!(registry.lookup_by_name("alice"), Some(alice));
        assert_eq!(registry.name_of(alice), Some(&name("alice")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_is_taken() {
        let mut registry = Registry::new();
        let first = ClientId::new();
        let second = ClientId::new();

        registry.register(first, name("alice")).unwrap();
        let err = registry.register(second, name("alice")).unwrap_err();

        assert!(matches!(err, AppError::NameTaken(n) if n == "alice"));
        assert!(registry.name_of(second).is_none());
        assert_eq!(registry.lookup_by_name("alice"), Some(first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_purges_both_directions() {
        let mut registry = Registry::new();
        let alice = ClientId::new();
        registry.register(alice, name("alice")).unwrap();

        assert_eq!(registry.unregister(alice), Some(name("alice")));
        assert!(registry.lookup_by_name("alice").is_none());
        assert!(registry.is_empty());

        // Name is free again
        registry.register(ClientId::new(), name("alice")).unwrap();
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut registry = Registry::new();
        assert!(registry.unregister(ClientId::new()).is_none());
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut registry = Registry::new();
        let alice = ClientId::new();
        let bob = ClientId::new();
        registry.register(alice, name("alice")).unwrap();
        registry.register(bob, name("bob")).unwrap();

        let old = registry.rename(alice, name("alicia")).unwrap();

        assert_eq!(old, name("alice"));
        assert!(registry.lookup_by_name("alice").is_none());
        assert_eq!(registry.lookup_by_name("alicia"), Some(alice));
        assert_eq!(registry.snapshot(), vec![name("alicia"), name("bob")]);
    }

    #[test]
    fn test_rename_collision_leaves_name_unchanged() {
        let mut registry = Registry::new();
        let alice = ClientId::new();
        let bob = ClientId::new();
        registry.register(alice, name("alice")).unwrap();
        registry.register(bob, name("bob")).unwrap();

        let err = registry.rename(bob, name("alice")).unwrap_err();

        assert!(matches!(err, AppError::NameTaken(_)));
        assert_eq!(registry.name_of(bob), Some(&name("bob")));
        assert_eq!(registry.lookup_by_name("alice"), Some(alice));
    }

    #[test]
    fn test_snapshot_insertion_order_after_removal() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..3).map(|_| ClientId::new()).collect();
        for (id, n) in ids.iter().zip(["carol", "alice", "bob"]) {
            registry.register(*id, name(n)).unwrap();
        }
        registry.unregister(ids[1]);

        assert_eq!(registry.snapshot(), vec![name("carol"), name("bob")]);
        assert_eq!(registry.clients().collect::<Vec<_>>(), vec![ids[0], ids[2]]);
    }
}
