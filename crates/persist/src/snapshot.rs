use serde::{Deserialize, Serialize};
use shardline_common::{Point, RegionId};
use shardline_proto::{MessageIn, MessageOut, msg};
use std::collections::BTreeMap;

/// Persistent state of a character, as sent to the account server.
///
/// The hash is computed over the other fields, enabling corruption detection
/// on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub database_id: u32,
    pub name: String,
    pub region: RegionId,
    pub position: Point,
    pub hit_points: u16,
    pub attributes: Vec<u16>,
    pub equipment: [u16; 4],
    pub hash: u64,
}

impl CharacterSnapshot {
    pub fn capture(
        database_id: u32,
        name: &str,
        region: RegionId,
        position: Point,
        hit_points: u16,
        attributes: &[u16],
        equipment: [u16; 4],
    ) -> Self {
        let mut snap = Self {
            database_id,
            name: name.to_owned(),
            region,
            position,
            hit_points,
            attributes: attributes.to_vec(),
            equipment,
            hash: 0,
        };
        snap.hash = snap.content_hash();
        snap
    }

    /// Verify the snapshot integrity by recomputing the hash.
    pub fn verify(&self) -> bool {
        self.hash == self.content_hash()
    }

    fn content_hash(&self) -> u64 {
        fnv1a_hash(&format!(
            "{}{}{:?}{:?}{}{:?}{:?}",
            self.database_id,
            self.name,
            self.region,
            self.position,
            self.hit_points,
            self.attributes,
            self.equipment
        ))
    }
}

/// Link from the game server to the account server.
///
/// Calls are fire-and-forget from the simulation's point of view; an
/// implementation buffers or forwards them without blocking the tick.
pub trait AccountLink {
    /// Stores the persistent state of a character.
    fn send_character_data(&mut self, snapshot: CharacterSnapshot);

    /// Forwards a control message (e.g. a redirect request).
    fn send(&mut self, message: MessageOut);
}

/// Account link keeping everything in memory.
///
/// Used by tests and the CLI in place of a network connection.
#[derive(Debug, Default)]
pub struct InMemoryAccountLink {
    characters: BTreeMap<u32, CharacterSnapshot>,
    flushes: usize,
    outbox: Vec<MessageOut>,
}

impl InMemoryAccountLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest stored state of a character.
    pub fn character(&self, database_id: u32) -> Option<&CharacterSnapshot> {
        self.characters.get(&database_id)
    }

    /// Number of flushes received so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Control messages received so far, oldest first.
    pub fn messages(&self) -> &[MessageOut] {
        &self.outbox
    }

    /// Character ids of every redirect request received so far.
    pub fn redirects(&self) -> Vec<u32> {
        self.outbox
            .iter()
            .filter(|m| m.tag() == msg::GAMSG_REDIRECT)
            .filter_map(|m| MessageIn::try_from(m).and_then(|mut r| r.read_u32()).ok())
            .collect()
    }
}

impl AccountLink for InMemoryAccountLink {
    fn send_character_data(&mut self, snapshot: CharacterSnapshot) {
        tracing::debug!(id = snapshot.database_id, name = %snapshot.name, "character data stored");
        self.flushes += 1;
        self.characters.insert(snapshot.database_id, snapshot);
    }

    fn send(&mut self, message: MessageOut) {
        self.outbox.push(message);
    }
}

/// FNV-1a hash for content addressing.
fn fnv1a_hash(data: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CharacterSnapshot {
        CharacterSnapshot::capture(
            7,
            "Ayla",
            RegionId(2),
            Point::new(320, 640),
            90,
            &[10, 12, 8],
            [0, 501, 0, 0],
        )
    }

    #[test]
    fn snapshot_capture_and_verify() {
        let snap = sample();
        assert!(snap.verify());
    }

    #[test]
    fn snapshot_corruption_detected() {
        let mut snap = sample();
        snap.position = Point::new(0, 0);
        assert!(!snap.verify());
    }

    #[test]
    fn snapshot_survives_json() {
        let snap = sample();
        let text = serde_json::to_string(&snap).unwrap();
        let back: CharacterSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
        assert!(back.verify());
    }

    #[test]
    fn link_keeps_latest_state() {
        let mut link = InMemoryAccountLink::new();
        link.send_character_data(sample());
        let mut moved = sample();
        moved.position = Point::new(1, 1);
        link.send_character_data(moved);
        assert_eq!(link.flush_count(), 2);
        assert_eq!(link.character(7).unwrap().position, Point::new(1, 1));
    }

    #[test]
    fn redirects_are_decoded() {
        let mut link = InMemoryAccountLink::new();
        let mut m = MessageOut::new(msg::GAMSG_REDIRECT);
        m.write_u32(7);
        link.send(m);
        link.send(MessageOut::new(msg::GPMSG_SAY));
        assert_eq!(link.redirects(), vec![7]);
    }
}
