//! Transport collaborator.

use shardline_common::EntityKey;
use shardline_proto::MessageOut;
use std::collections::{BTreeMap, BTreeSet};

/// Outbound side of the connection layer, as seen by the simulation.
///
/// Every call is fire-and-forget: implementations queue and return.
pub trait GameHandler {
    /// Queues a message for the client controlling `observer`.
    fn send_to(&mut self, observer: EntityKey, message: MessageOut);

    /// Disconnects the client controlling `observer`.
    fn kill(&mut self, observer: EntityKey);

    /// Tells the client controlling `observer` to reconnect to the server
    /// hosting its new region.
    fn prepare_server_change(&mut self, observer: EntityKey);
}

/// Handler that keeps every outbound message, per observer, in memory.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    queues: BTreeMap<EntityKey, Vec<MessageOut>>,
    killed: BTreeSet<EntityKey>,
    server_changes: Vec<EntityKey>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_for(&self, observer: EntityKey) -> &[MessageOut] {
        self.queues.get(&observer).map_or(&[], Vec::as_slice)
    }

    /// Messages for `observer` carrying `tag`.
    pub fn tagged(&self, observer: EntityKey, tag: u16) -> Vec<&MessageOut> {
        self.messages_for(observer).iter().filter(|m| m.tag() == tag).collect()
    }

    pub fn take(&mut self, observer: EntityKey) -> Vec<MessageOut> {
        self.queues.remove(&observer).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    pub fn total(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn is_killed(&self, observer: EntityKey) -> bool {
        self.killed.contains(&observer)
    }

    pub fn server_changes(&self) -> &[EntityKey] {
        &self.server_changes
    }
}

impl GameHandler for RecordingHandler {
    fn send_to(&mut self, observer: EntityKey, message: MessageOut) {
        self.queues.entry(observer).or_default().push(message);
    }

    fn kill(&mut self, observer: EntityKey) {
        self.killed.insert(observer);
    }

    fn prepare_server_change(&mut self, observer: EntityKey) {
        self.server_changes.push(observer);
    }
}
