//! Message tags. `GP*` go from the game server to clients, `GA*` from the
//! game server to the account server.

pub const GPMSG_TRADE_CANCEL: u16 = 0x00C3;
pub const GPMSG_PLAYER_MAP_CHANGE: u16 = 0x0100;
pub const GPMSG_PLAYER_ATTRIBUTE_CHANGE: u16 = 0x0130;
pub const GPMSG_BEING_ENTER: u16 = 0x0200;
pub const GPMSG_BEING_LEAVE: u16 = 0x0201;
pub const GPMSG_ITEM_APPEAR: u16 = 0x0202;
pub const GPMSG_BEING_LOOKS_CHANGE: u16 = 0x0210;
pub const GPMSG_BEING_ACTION_CHANGE: u16 = 0x0271;
pub const GPMSG_BEING_DIR_CHANGE: u16 = 0x0273;
pub const GPMSG_BEINGS_MOVE: u16 = 0x0280;
pub const GPMSG_ITEMS: u16 = 0x0281;
pub const GPMSG_BEING_ATTACK: u16 = 0x0291;
pub const GPMSG_SAY: u16 = 0x02A0;
pub const GPMSG_BEINGS_DAMAGE: u16 = 0x0310;

pub const GAMSG_REDIRECT: u16 = 0x0510;

/// Bits of the per-being flag byte in `GPMSG_BEINGS_MOVE`.
pub const MOVING_POSITION: u8 = 1;
pub const MOVING_DESTINATION: u8 = 2;

/// Speaker id of server-originated chat.
pub const SAY_FROM_SERVER: u16 = 0;
/// Speaker id of chat from sources without a public id.
pub const SAY_FROM_FIXED: u16 = 65535;
