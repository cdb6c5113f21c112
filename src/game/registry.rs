//! Network Object Registry
//!
//! Per-session ownership of every registered object, with a spawn-ordered
//! view and a fast id lookup that are only ever mutated together.

use std::collections::HashMap;

use crate::game::objects::{NetId, NetObject, MIN_SERVER_NET_ID};

// =============================================================================
// ID ALLOCATOR
// =============================================================================

/// Issues server-owned object ids.
///
/// Starts at [`MIN_SERVER_NET_ID`] and only ever counts up.
#[derive(Debug, Clone)]
pub struct ObjectIdAllocator {
    next: NetId,
}

impl ObjectIdAllocator {
    /// Fresh allocator.
    pub fn new() -> Self {
        Self { next: MIN_SERVER_NET_ID }
    }

    /// Next unused id.
    pub fn next_id(&mut self) -> NetId {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    /// Id the next call will return.
    pub fn peek(&self) -> NetId {
        self.next
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Live objects of one session.
#[derive(Debug, Default, Clone)]
pub struct NetObjectRegistry {
    /// Owning arena keyed by id.
    objects: HashMap<NetId, NetObject>,
    /// Ids in registration order.
    order: Vec<NetId>,
}

impl NetObjectRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object. Fails without replacing on id collision.
    pub fn register(&mut self, object: NetObject) -> bool {
        if self.objects.contains_key(&object.net_id) {
            return false;
        }

        self.order.push(object.net_id);
        self.objects.insert(object.net_id, object);
        true
    }

    /// Remove an object from both views. No-op if absent.
    pub fn unregister(&mut self, net_id: NetId) -> Option<NetObject> {
        let object = self.objects.remove(&net_id)?;
        if let Some(index) = self.order.iter().position(|id| *id == net_id) {
            self.order.remove(index);
        }
        Some(object)
    }

    /// Look up an object.
    pub fn find(&self, net_id: NetId) -> Option<&NetObject> {
        self.objects.get(&net_id)
    }

    /// Look up an object mutably.
    pub fn find_mut(&mut self, net_id: NetId) -> Option<&mut NetObject> {
        self.objects.get_mut(&net_id)
    }

    /// True if `net_id` is registered.
    pub fn contains(&self, net_id: NetId) -> bool {
        self.objects.contains_key(&net_id)
    }

    /// Objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &NetObject> {
        self.order.iter().filter_map(move |id| self.objects.get(id))
    }

    /// Ids in registration order.
    pub fn ids(&self) -> &[NetId] {
        &self.order
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::objects::ObjectState;
    use proptest::prelude::*;

    fn lobby(net_id: NetId) -> NetObject {
        let mut obj = NetObject::new(ObjectState::LobbyBehaviour);
        obj.net_id = net_id;
        obj
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = ObjectIdAllocator::new();
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert_eq!(a, MIN_SERVER_NET_ID);
        assert!(b > a);
        assert_eq!(alloc.peek(), b + 1);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = NetObjectRegistry::new();
        assert!(registry.register(lobby(5)));

        let mut other = NetObject::new(ObjectState::PlayerPhysics);
        other.net_id = 5;
        assert!(!registry.register(other));

        assert_eq!(registry.len(), 1);
        assert!(matches!(registry.find(5).unwrap().state, ObjectState::LobbyBehaviour));
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let mut registry = NetObjectRegistry::new();
        registry.register(lobby(1));
        assert!(registry.unregister(2).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_iteration_follows_registration_order() {
        let mut registry = NetObjectRegistry::new();
        for id in [9, 3, 7] {
            registry.register(lobby(id));
        }
        registry.unregister(3);

        let ids: Vec<_> = registry.iter().map(|o| o.net_id).collect();
        assert_eq!(ids, vec![9, 7]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(NetId),
        Unregister(NetId),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..16).prop_map(Op::Register),
            (0u32..16).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn test_views_agree_on_membership(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut registry = NetObjectRegistry::new();

            for op in ops {
                match op {
                    Op::Register(id) => {
                        let existed = registry.contains(id);
                        prop_assert_eq!(registry.register(lobby(id)), !existed);
                    }
                    Op::Unregister(id) => {
                        registry.unregister(id);
                    }
                }

                prop_assert_eq!(registry.ids().len(), registry.len());
                for id in registry.ids() {
                    prop_assert!(registry.find(*id).is_some());
                }
                prop_assert_eq!(registry.iter().count(), registry.len());
            }
        }
    }
}
