//! Player Directory
//!
//! Maps a compact player slot to that player's metadata object, indexed
//! both by slot and by connection id. Both indices change together or not
//! at all.

use std::collections::{BTreeMap, HashMap};

use crate::game::objects::{NetId, NO_SLOT};
use crate::game::player::ClientId;

/// One roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Player slot.
    pub slot: u8,
    /// Owning connection.
    pub client_id: ClientId,
    /// Player-info object id.
    pub info_net_id: NetId,
}

/// Slot/connection roster for one session.
#[derive(Debug, Default, Clone)]
pub struct PlayerDirectory {
    by_slot: BTreeMap<u8, DirectoryEntry>,
    by_client: HashMap<ClientId, u8>,
}

impl PlayerDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Fails if either the slot or the connection is taken.
    pub fn add_player(&mut self, slot: u8, client_id: ClientId, info_net_id: NetId) -> bool {
        if slot == NO_SLOT
            || self.by_slot.contains_key(&slot)
            || self.by_client.contains_key(&client_id)
        {
            return false;
        }

        self.by_slot.insert(slot, DirectoryEntry { slot, client_id, info_net_id });
        self.by_client.insert(client_id, slot);
        true
    }

    /// Remove a slot from both indices.
    pub fn remove_player(&mut self, slot: u8) -> Option<DirectoryEntry> {
        let entry = self.by_slot.remove(&slot)?;
        self.by_client.remove(&entry.client_id);
        Some(entry)
    }

    /// Remove the entry bound to a player-info object, whatever slot it holds.
    pub fn remove_by_info(&mut self, info_net_id: NetId) -> Option<DirectoryEntry> {
        let slot = self
            .by_slot
            .values()
            .find(|entry| entry.info_net_id == info_net_id)?
            .slot;
        self.remove_player(slot)
    }

    /// Lowest free slot, or [`NO_SLOT`] when all 255 are taken.
    pub fn next_available_slot(&self) -> u8 {
        (0..NO_SLOT)
            .find(|slot| !self.by_slot.contains_key(slot))
            .unwrap_or(NO_SLOT)
    }

    /// Entry for a slot.
    pub fn get_by_slot(&self, slot: u8) -> Option<&DirectoryEntry> {
        if slot == NO_SLOT {
            return None;
        }
        self.by_slot.get(&slot)
    }

    /// Entry for a connection.
    pub fn get_by_client(&self, client_id: ClientId) -> Option<&DirectoryEntry> {
        self.by_client
            .get(&client_id)
            .and_then(|slot| self.by_slot.get(slot))
    }

    /// True if the connection has an entry.
    pub fn contains_client(&self, client_id: ClientId) -> bool {
        self.by_client.contains_key(&client_id)
    }

    /// Entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.by_slot.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.by_slot.clear();
        self.by_client.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_directory() -> PlayerDirectory {
        let mut dir = PlayerDirectory::new();
        for slot in 0..NO_SLOT {
            assert!(dir.add_player(slot, slot as ClientId + 1000, slot as NetId));
        }
        dir
    }

    #[test]
    fn test_empty_directory_starts_at_zero() {
        assert_eq!(PlayerDirectory::new().next_available_slot(), 0);
    }

    #[test]
    fn test_full_directory_returns_sentinel() {
        let dir = full_directory();
        assert_eq!(dir.len(), 255);
        assert_eq!(dir.next_available_slot(), NO_SLOT);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut dir = full_directory();
        dir.remove_player(3);
        assert_eq!(dir.next_available_slot(), 3);
    }

    #[test]
    fn test_add_is_atomic_over_both_indices() {
        let mut dir = PlayerDirectory::new();
        assert!(dir.add_player(0, 10, 100));

        // Same connection, new slot
        assert!(!dir.add_player(1, 10, 101));
        assert!(dir.get_by_slot(1).is_none());

        // Same slot, new connection
        assert!(!dir.add_player(0, 11, 102));
        assert!(!dir.contains_client(11));

        assert_eq!(dir.get_by_client(10).unwrap().info_net_id, 100);
    }

    #[test]
    fn test_remove_clears_both_indices() {
        let mut dir = PlayerDirectory::new();
        dir.add_player(4, 20, 200);
        let removed = dir.remove_player(4).unwrap();
        assert_eq!(removed.client_id, 20);
        assert!(dir.get_by_client(20).is_none());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_remove_by_info_only_matches_bound_object() {
        let mut dir = PlayerDirectory::new();
        dir.add_player(0, 1, 50);

        // A second info that never got a slot removes nothing
        assert!(dir.remove_by_info(51).is_none());
        assert_eq!(dir.get_by_slot(0).unwrap().info_net_id, 50);

        let removed = dir.remove_by_info(50).unwrap();
        assert_eq!(removed.slot, 0);
        assert!(!dir.contains_client(1));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_sentinel_slot_is_rejected() {
        let mut dir = PlayerDirectory::new();
        assert!(!dir.add_player(NO_SLOT, 1, 1));
        assert!(dir.get_by_slot(NO_SLOT).is_none());
    }
}
