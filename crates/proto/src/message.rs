/// Size of the tag preceding every message body.
pub const HEADER_LEN: usize = 2;

/// Errors raised while decoding a message.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtoError {
    #[error("short read: needed {needed} bytes, {remaining} left")]
    ShortRead { needed: usize, remaining: usize },
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),
}

/// Outgoing message under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOut {
    tag: u16,
    data: Vec<u8>,
}

impl MessageOut {
    pub fn new(tag: u16) -> Self {
        let mut data = Vec::with_capacity(16);
        data.extend_from_slice(&tag.to_le_bytes());
        Self { tag, data }
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    /// Total length, header included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Length of the payload after the tag.
    pub fn body_len(&self) -> usize {
        self.data.len() - HEADER_LEN
    }

    /// True when nothing was written after the tag.
    pub fn is_empty(&self) -> bool {
        self.body_len() == 0
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u16 length prefix then the bytes. Longer strings are cut at
    /// the last character boundary that fits.
    pub fn write_string(&mut self, value: &str) {
        let mut end = value.len().min(u16::MAX as usize);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.write_u16(end as u16);
        self.data.extend_from_slice(&value.as_bytes()[..end]);
    }

    /// Packs two 12-bit values into 3 bytes.
    pub fn write_coordinates(&mut self, x: u16, y: u16) {
        let (x, y) = (x & 0x0fff, y & 0x0fff);
        self.data.push(x as u8);
        self.data.push(((x >> 8) | (y << 4)) as u8);
        self.data.push((y >> 4) as u8);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Cursor over a received message.
#[derive(Debug, Clone)]
pub struct MessageIn<'a> {
    tag: u16,
    rest: &'a [u8],
}

impl<'a> MessageIn<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtoError> {
        let mut rest = bytes;
        let tag = u16::from_le_bytes(take::<2>(&mut rest)?);
        Ok(Self { tag, rest })
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtoError> {
        Ok(take::<1>(&mut self.rest)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtoError> {
        Ok(u16::from_le_bytes(take::<2>(&mut self.rest)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtoError> {
        Ok(u32::from_le_bytes(take::<4>(&mut self.rest)?))
    }

    pub fn read_string(&mut self) -> Result<String, ProtoError> {
        let len = self.read_u16()? as usize;
        if self.rest.len() < len {
            return Err(ProtoError::ShortRead {
                needed: len,
                remaining: self.rest.len(),
            });
        }
        let (s, rest) = self.rest.split_at(len);
        self.rest = rest;
        String::from_utf8(s.to_vec()).map_err(|_| ProtoError::InvalidString)
    }

    pub fn read_coordinates(&mut self) -> Result<(u16, u16), ProtoError> {
        let [a, b, c] = take::<3>(&mut self.rest)?;
        let x = u16::from(a) | (u16::from(b & 0x0f) << 8);
        let y = u16::from(b >> 4) | (u16::from(c) << 4);
        Ok((x, y))
    }
}

impl<'a> TryFrom<&'a MessageOut> for MessageIn<'a> {
    type Error = ProtoError;

    fn try_from(msg: &'a MessageOut) -> Result<Self, ProtoError> {
        Self::parse(msg.as_bytes())
    }
}

fn take<const N: usize>(inp: &mut &[u8]) -> Result<[u8; N], ProtoError> {
    if inp.len() < N {
        return Err(ProtoError::ShortRead {
            needed: N,
            remaining: inp.len(),
        });
    }
    let (a, b) = inp.split_at(N);
    *inp = b;
    let mut buf = [0u8; N];
    buf.copy_from_slice(a);
    Ok(buf)
}
