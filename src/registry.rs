//! In-memory room membership registry.
//!
//! The registry is the only mutable state on the relay side. It is an owned
//! value injected into the relay at startup and mutated exclusively by the
//! relay's own connection handlers; nothing here is global. State is lost on
//! process restart, which is acceptable: sessions are short-lived and clients
//! recover by rejoining the same room id.

use std::collections::{HashMap, HashSet};

/// Maps room ids to the set of participant ids currently joined.
///
/// Rooms exist implicitly: created on first join, dropped when the last
/// member leaves.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant` to `room`. Idempotent; returns `true` only when the
    /// participant was not already a member.
    pub fn join(&mut self, room: &str, participant: &str) -> bool {
        self.rooms
            .entry(room.to_owned())
            .or_default()
            .insert(participant.to_owned())
    }

    /// Removes `participant` from `room`, dropping the room once empty.
    /// Returns `true` when a membership was actually removed.
    pub fn leave(&mut self, room: &str, participant: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(participant);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }

    /// Disconnect path: removes `participant` from every room it is in and
    /// returns the rooms it actually left.
    pub fn leave_all(&mut self, participant: &str) -> Vec<String> {
        let affected: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(participant))
            .map(|(room, _)| room.clone())
            .collect();
        for room in &affected {
            self.leave(room, participant);
        }
        affected
    }

    /// Current member count; 0 for unknown rooms.
    pub fn count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }

    /// Snapshot of the member ids of `room`.
    pub fn members(&self, room: &str) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live (non-empty) rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_tracks_joins_and_leaves() {
        let mut reg = RoomRegistry::new();
        assert_eq!(reg.count("r1"), 0);

        reg.join("r1", "a");
        reg.join("r1", "b");
        assert_eq!(reg.count("r1"), 2);

        assert!(reg.leave("r1", "a"));
        assert_eq!(reg.count("r1"), 1);
        assert!(!reg.leave("r1", "a"));
        assert_eq!(reg.count("r1"), 1);
    }

    #[test]
    fn join_is_idempotent() {
        let mut reg = RoomRegistry::new();
        assert!(reg.join("r1", "a"));
        assert!(!reg.join("r1", "a"));
        assert_eq!(reg.count("r1"), 1);
    }

    #[test]
    fn emptied_rooms_are_dropped() {
        let mut reg = RoomRegistry::new();
        reg.join("r1", "a");
        assert_eq!(reg.room_count(), 1);
        reg.leave("r1", "a");
        assert_eq!(reg.room_count(), 0);
        assert_eq!(reg.count("r1"), 0);
    }

    #[test]
    fn leave_all_reports_affected_rooms() {
        let mut reg = RoomRegistry::new();
        reg.join("r1", "a");
        reg.join("r2", "a");
        reg.join("r2", "b");

        let mut left = reg.leave_all("a");
        left.sort();
        assert_eq!(left, vec!["r1".to_owned(), "r2".to_owned()]);
        assert_eq!(reg.count("r1"), 0);
        assert_eq!(reg.count("r2"), 1);
        assert!(reg.leave_all("a").is_empty());
    }

    #[test]
    fn members_excludes_other_rooms() {
        let mut reg = RoomRegistry::new();
        reg.join("r1", "a");
        reg.join("r2", "b");
        assert_eq!(reg.members("r1"), vec!["a".to_owned()]);
        assert_eq!(reg.members("r3"), Vec::<String>::new());
    }
}
