//! Room registry - per-replica view of room membership.
//!
//! The registry is mutated only by the synchronizer's apply task, so a
//! replica observes every membership change in subscription order. The
//! membership snapshots returned by the mutation helpers are taken
//! while the room's entry is held, so a snapshot always reflects a
//! single consistent point, never a partially applied change.

use dashmap::DashMap;
use roomcast_proto::{ClientId, RoomId};
use std::collections::HashSet;

/// Outcome of applying a leave event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Whether the connection was actually a member. False means the
    /// leave was already applied (or never preceded by a join) and
    /// should trigger no notifications.
    pub removed: bool,
    /// Membership snapshot after the removal, sorted.
    pub remaining: Vec<ClientId>,
    /// Whether this removal emptied the room. An emptied room is gone:
    /// it has no existence independent of its members.
    pub emptied: bool,
}

/// Mapping of rooms to their member connections, with a reverse index
/// for disconnect-time enumeration.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, HashSet<ClientId>>,
    memberships: DashMap<ClientId, HashSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a join. Returns the post-join membership snapshot, sorted.
    pub fn apply_join(&self, conn: &ClientId, room: &RoomId) -> Vec<ClientId> {
        let snapshot = {
            let mut members = self.rooms.entry(room.clone()).or_default();
            members.insert(conn.clone());
            sorted(&members)
        };
        self.memberships
            .entry(conn.clone())
            .or_default()
            .insert(room.clone());
        snapshot
    }

    /// Apply a leave. See [`LeaveOutcome`].
    pub fn apply_leave(&self, conn: &ClientId, room: &RoomId) -> LeaveOutcome {
        let mut outcome = LeaveOutcome {
            removed: false,
            remaining: Vec::new(),
            emptied: false,
        };

        // Entry guard must be dropped before the map-level remove.
        if let Some(mut members) = self.rooms.get_mut(room) {
            outcome.removed = members.remove(conn);
            if members.is_empty() {
                outcome.emptied = true;
            } else {
                outcome.remaining = sorted(&members);
            }
        }
        if outcome.emptied {
            self.rooms.remove(room);
        }

        let mut drop_entry = false;
        if let Some(mut rooms) = self.memberships.get_mut(conn) {
            rooms.remove(room);
            drop_entry = rooms.is_empty();
        }
        if drop_entry {
            self.memberships.remove(conn);
        }

        outcome
    }

    /// Membership snapshot of a room, sorted. Empty when the room does
    /// not exist.
    pub fn members(&self, room: &RoomId) -> Vec<ClientId> {
        self.rooms.get(room).map(|m| sorted(&m)).unwrap_or_default()
    }

    /// The rooms a connection currently belongs to.
    pub fn rooms_of(&self, conn: &ClientId) -> Vec<RoomId> {
        self.memberships
            .get(conn)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one member.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}

fn sorted(members: &HashSet<ClientId>) -> Vec<ClientId> {
    let mut snapshot: Vec<ClientId> = members.iter().cloned().collect();
    snapshot.sort();
    snapshot
}
