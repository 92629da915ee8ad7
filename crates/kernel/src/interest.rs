//! Area-of-interest reporting: what each observer learns at the end of a tick.
//!
//! An entity `o` is reported to an observer `p` by comparing two ranges:
//! whether `p` saw `o` last tick (old positions, neither new on the map) and
//! whether `p` sees it now. Entering and leaving are each reported exactly
//! once; entities staying in range only send what changed.

use crate::entity::{Entity, LOOK_SLOTS, Payload};
use crate::handler::GameHandler;
use crate::world::GameState;
use shardline_common::{EntityKey, Point, UpdateFlags};
use shardline_persist::AccountLink;
use shardline_proto::{MessageOut, msg};

/// Upper mask bit: the client clears every slot before applying the list.
pub const LOOKS_FULL: u8 = 0x80;

/// Writes the looks of a character: a slot mask followed by one sprite id
/// per selected slot, in slot order.
///
/// Without a previous report every slot counts as changed. The full form
/// (non-empty slots only, client clears the rest) is chosen whenever it is
/// not longer than the list of changed slots.
pub fn serialize_looks(
    message: &mut MessageOut,
    current: &[u16; LOOK_SLOTS],
    previous: Option<&[u16; LOOK_SLOTS]>,
) {
    let mut changed = 0u8;
    let mut full = 0u8;
    for (slot, &sprite) in current.iter().enumerate() {
        if previous.is_none_or(|prev| prev[slot] != sprite) {
            changed |= 1 << slot;
        }
        if sprite != 0 {
            full |= 1 << slot;
        }
    }
    let mask = if full.count_ones() <= changed.count_ones() {
        full | LOOKS_FULL
    } else {
        changed
    };
    message.write_u8(mask);
    for (slot, &sprite) in current.iter().enumerate() {
        if mask & (1 << slot) != 0 {
            message.write_u16(sprite);
        }
    }
}

fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, i32::from(u16::MAX)) as u16
}

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    /// Sends `observer` everything that changed around it this tick.
    pub fn report_to(&mut self, observer: EntityKey) {
        let (beings, items) = self.compose_report(observer);
        for message in beings {
            self.send_to(observer, message);
        }
        self.send_status(observer);
        for message in items {
            self.send_to(observer, message);
        }
    }

    /// Builds the messages for `observer` without touching any state.
    /// Returns the being-related messages and the item-related ones.
    pub(crate) fn compose_report(&self, observer: EntityKey) -> (Vec<MessageOut>, Vec<MessageOut>) {
        let mut beings = Vec::new();
        let mut items = Vec::new();
        let Some(p) = self.entities.get(observer) else {
            return (beings, items);
        };
        let Some(region) = self.regions.get(&p.region()) else {
            return (beings, items);
        };
        let radius = self.config.around_area;
        let (pold, ppos) = (p.old_position(), p.position());
        let pflags = p.update_flags();

        let mut moves = MessageOut::new(msg::GPMSG_BEINGS_MOVE);
        let mut damage = MessageOut::new(msg::GPMSG_BEINGS_DAMAGE);
        let mut vanished = MessageOut::new(msg::GPMSG_ITEMS);

        for key in region.around(&[pold, ppos], radius) {
            let Some(o) = self.entities.get(key) else {
                continue;
            };
            let Some(oid) = o.public_id() else {
                continue;
            };
            let (oold, opos) = (o.old_position(), o.position());
            let oflags = o.update_flags();
            let fresh = (pflags | oflags).intersects(UpdateFlags::NEW_ON_MAP);
            let were_in_range = pold.in_range_of(oold, radius) && !fresh;
            let will_be_in_range = ppos.in_range_of(opos, radius);

            if let Payload::Item(item) = o.payload() {
                if were_in_range != will_be_in_range {
                    if oflags.contains(UpdateFlags::NEW_ON_MAP) {
                        let mut appear = MessageOut::new(msg::GPMSG_ITEM_APPEAR);
                        appear.write_u16(item.item.0);
                        write_point(&mut appear, opos);
                        items.push(appear);
                    } else {
                        vanished.write_u16(if will_be_in_range { item.item.0 } else { 0 });
                        write_point(&mut vanished, opos);
                    }
                }
                continue;
            }
            if !o.kind().can_move() || (!were_in_range && !will_be_in_range) {
                continue;
            }

            if were_in_range && will_be_in_range {
                self.report_changes(o, oid.0, key == observer, &mut beings, &mut damage);
                if oold == opos {
                    continue;
                }
            }

            if !will_be_in_range {
                let mut leave = MessageOut::new(msg::GPMSG_BEING_LEAVE);
                leave.write_u16(oid.0);
                beings.push(leave);
                continue;
            }

            if !were_in_range {
                beings.push(self.enter_message(o, oid.0));
                continue;
            }

            self.write_move(&mut moves, o, oid.0);
        }

        beings.push(moves);
        beings.push(damage);
        items.push(vanished);
        (beings, items)
    }

    /// Per-flag messages about a being that stays in range.
    fn report_changes(&self, o: &Entity, oid: u16, is_self: bool, out: &mut Vec<MessageOut>, damage: &mut MessageOut) {
        let flags = o.update_flags();
        let being = o.being();

        if flags.contains(UpdateFlags::ATTACK) && !is_self {
            let mut attack = MessageOut::new(msg::GPMSG_BEING_ATTACK);
            attack.write_u16(oid);
            attack.write_u8(o.direction().wire_code());
            attack.write_u8(being.map_or(0, |b| b.attack_type));
            out.push(attack);
        }
        if flags.contains(UpdateFlags::ACTION_CHANGE) {
            let mut action = MessageOut::new(msg::GPMSG_BEING_ACTION_CHANGE);
            action.write_u16(oid);
            action.write_u8(o.action().wire_code());
            out.push(action);
        }
        if flags.contains(UpdateFlags::LOOKS_CHANGE) {
            if let Some(c) = o.character_data() {
                let mut looks = MessageOut::new(msg::GPMSG_BEING_LOOKS_CHANGE);
                looks.write_u16(oid);
                serialize_looks(&mut looks, &self.sprites_of(c), c.reported_looks());
                out.push(looks);
            }
        }
        if flags.contains(UpdateFlags::DIR_CHANGE) {
            let mut dir = MessageOut::new(msg::GPMSG_BEING_DIR_CHANGE);
            dir.write_u16(oid);
            dir.write_u8(o.direction().wire_code());
            out.push(dir);
        }
        if o.kind().can_fight() {
            for &hit in being.map_or(&[][..], |b| b.hits()) {
                damage.write_u16(oid);
                damage.write_u16(hit);
            }
        }
    }

    /// Enter message; the destination rides along so no move record follows.
    fn enter_message(&self, o: &Entity, oid: u16) -> MessageOut {
        let mut enter = MessageOut::new(msg::GPMSG_BEING_ENTER);
        enter.write_u8(o.kind().wire_code());
        enter.write_u16(oid);
        enter.write_u8(o.action().wire_code());
        write_point(&mut enter, o.position());
        write_point(&mut enter, o.destination());
        match o.payload() {
            Payload::Character(c) => {
                enter.write_string(&c.name);
                enter.write_u8(c.hair_style);
                enter.write_u8(c.hair_color);
                enter.write_u8(c.gender);
                serialize_looks(&mut enter, &self.sprites_of(c), None);
            }
            Payload::Monster(m) => {
                enter.write_u16(m.species);
                enter.write_string(&m.name);
            }
            Payload::Npc(n) => {
                enter.write_u16(n.npc_id);
                enter.write_string(&n.name);
            }
            Payload::Item(_) | Payload::SpawnArea(_) => {}
        }
        enter
    }

    fn write_move(&self, moves: &mut MessageOut, o: &Entity, oid: u16) {
        let (pos, dst) = (o.position(), o.destination());
        let mut flags = 0u8;
        if pos != dst {
            flags |= msg::MOVING_POSITION;
            if o.update_flags().contains(UpdateFlags::NEW_DESTINATION) {
                flags |= msg::MOVING_DESTINATION;
            }
        } else {
            // Last step: the client only needs where it ends.
            flags |= msg::MOVING_DESTINATION;
        }
        moves.write_u16(oid);
        moves.write_u8(flags);
        if flags & msg::MOVING_POSITION != 0 {
            let tile = self.config.tile_size;
            moves.write_coordinates(clamp_u16(pos.x / tile), clamp_u16(pos.y / tile));
            moves.write_u8((o.speed() / 10).min(u16::from(u8::MAX)) as u8);
        }
        if flags & msg::MOVING_DESTINATION != 0 {
            write_point(moves, dst);
        }
    }

    /// Sends a character its own attribute changes.
    fn send_status(&mut self, observer: EntityKey) {
        let Some(c) = self.entities.get_mut(observer).and_then(|e| e.character_data_mut()) else {
            return;
        };
        let mut status = MessageOut::new(msg::GPMSG_PLAYER_ATTRIBUTE_CHANGE);
        for (attribute, value) in c.take_modified_attributes() {
            status.write_u16(attribute);
            status.write_u16(value);
        }
        self.send_to(observer, status);
    }
}

pub(crate) fn write_point(message: &mut MessageOut, p: Point) {
    message.write_u16(clamp_u16(p.x));
    message.write_u16(clamp_u16(p.y));
}
