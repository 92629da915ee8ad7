//! Chat delivery.

use crate::handler::GameHandler;
use crate::world::GameState;
use shardline_common::{EntityKey, EntityKind};
use shardline_persist::AccountLink;
use shardline_proto::{MessageOut, msg};

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    /// Sends `text` to every character in range of the speaker, speaker
    /// included.
    pub fn say_around(&mut self, speaker: EntityKey, text: &str) {
        let Some(e) = self.entities.get(speaker).filter(|e| e.is_inserted()) else {
            return;
        };
        for observer in self.observers_around(e.region(), e.position()) {
            self.say_to(observer, Some(speaker), text);
        }
    }

    /// Sends `text` to one character. Without a source the message comes
    /// from the server; sources that cannot move have no public id.
    pub fn say_to(&mut self, destination: EntityKey, source: Option<EntityKey>, text: &str) {
        if self.entities.get(destination).map(|e| e.kind()) != Some(EntityKind::Character) {
            return;
        }
        let speaker = match source {
            None => msg::SAY_FROM_SERVER,
            Some(key) => self
                .entities
                .get(key)
                .filter(|e| e.kind().can_move())
                .and_then(|e| e.public_id())
                .map_or(msg::SAY_FROM_FIXED, |id| id.0),
        };
        let mut message = MessageOut::new(msg::GPMSG_SAY);
        message.write_u16(speaker);
        message.write_string(text);
        self.send_to(destination, message);
    }
}
