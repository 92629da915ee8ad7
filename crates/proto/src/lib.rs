//! Wire protocol: tagged, little-endian messages.
//!
//! # Invariants
//! - Every message starts with its u16 tag; the body follows immediately.
//! - Strings are length-prefixed (u16) UTF-8.
//! - Coordinates pack two 12-bit tile values into 3 bytes.

mod message;
pub mod msg;

pub use message::{MessageIn, MessageOut, ProtoError, HEADER_LEN};

pub fn crate_info() -> &'static str {
    "shardline-proto v0.1.0"
}
