//! Binary stream encoding for explain records.
//!
//! All fixed-width integers are big-endian. Layout rules:
//! - `bool` is one byte, `0` or `1`; anything else is rejected
//! - `vint`/`vlong` use 7-bit groups, low group first, high bit = more
//! - strings are a `vint` byte length followed by UTF-8
//! - optional values carry a leading presence `bool`
//! - lists carry a leading `vint` count
//! - enums are a single ordinal byte
//!
//! A whole record is framed as
//! `[magic "SGAD"][version: u16][body length: u32][body]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shardgrid_core::DiscoveryNode;

use crate::error::{DecisionError, DecisionResult};

/// Leading bytes of every framed record.
pub const FRAME_MAGIC: [u8; 4] = *b"SGAD";

/// Current wire version. Field order inside a record must not change
/// without bumping this.
pub const WIRE_VERSION: u16 = 1;

const FRAME_HEADER_LEN: usize = 4 + 2 + 4;

/// Deepest multi-decision nesting accepted on read.
pub const MAX_NESTING_DEPTH: usize = 32;

/// A value that can be written to a [`StreamOutput`].
pub trait Writeable {
    fn write_to(&self, out: &mut StreamOutput);
}

/// A value that can be read back from a [`StreamInput`].
pub trait Readable: Sized {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self>;
}

/// A fieldless enum with a stable one-byte ordinal.
pub trait WireEnum: Copy + Sized {
    /// Name used in decode errors.
    const KIND: &'static str;

    fn ordinal(self) -> u8;

    fn from_ordinal(ordinal: u8) -> Option<Self>;
}

// ── Output ────────────────────────────────────────────────────────

/// Growable output buffer.
#[derive(Debug, Default)]
pub struct StreamOutput {
    buf: BytesMut,
}

impl StreamOutput {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_vint(&mut self, mut v: u32) {
        while v >= 0x80 {
            self.buf.put_u8((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    pub fn write_vlong(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.buf.put_u8((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_len(s.len());
        self.buf.put_slice(s.as_bytes());
    }

    pub fn write_optional_string(&mut self, s: Option<&str>) {
        self.write_bool(s.is_some());
        if let Some(s) = s {
            self.write_string(s);
        }
    }

    pub fn write_enum<E: WireEnum>(&mut self, e: E) {
        self.buf.put_u8(e.ordinal());
    }

    pub fn write_optional_enum<E: WireEnum>(&mut self, e: Option<E>) {
        self.write_bool(e.is_some());
        if let Some(e) = e {
            self.write_enum(e);
        }
    }

    pub fn write_optional<T: Writeable>(&mut self, value: Option<&T>) {
        self.write_bool(value.is_some());
        if let Some(v) = value {
            v.write_to(self);
        }
    }

    pub fn write_list<T: Writeable>(&mut self, items: &[T]) {
        self.write_len(items.len());
        for item in items {
            item.write_to(self);
        }
    }

    fn write_len(&mut self, len: usize) {
        // Lengths above u32::MAX cannot be produced by in-memory explain records.
        self.write_vint(u32::try_from(len).unwrap_or(u32::MAX));
    }
}

// ── Input ─────────────────────────────────────────────────────────

/// Cursor over a received byte slice.
#[derive(Debug)]
pub struct StreamInput<'a> {
    buf: &'a [u8],
    depth: usize,
}

impl<'a> StreamInput<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, depth: 0 }
    }

    /// Step into a nested record, failing past [`MAX_NESTING_DEPTH`].
    pub fn enter_nested(&mut self) -> DecisionResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DecisionError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, need: usize) -> DecisionResult<()> {
        if self.buf.remaining() < need {
            return Err(DecisionError::Truncated {
                expected: need,
                actual: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> DecisionResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> DecisionResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> DecisionResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_bool(&mut self) -> DecisionResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecisionError::InvalidBool(other)),
        }
    }

    pub fn read_vint(&mut self) -> DecisionResult<u32> {
        let mut value: u32 = 0;
        for i in 0..5 {
            let b = self.read_u8()?;
            // The fifth group may only carry the top four bits.
            if i == 4 && b & 0xf0 != 0 {
                return Err(DecisionError::VarIntOverflow { bits: 32 });
            }
            value |= u32::from(b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecisionError::VarIntOverflow { bits: 32 })
    }

    pub fn read_vlong(&mut self) -> DecisionResult<u64> {
        let mut value: u64 = 0;
        for i in 0..10 {
            let b = self.read_u8()?;
            if i == 9 && b & 0xfe != 0 {
                return Err(DecisionError::VarIntOverflow { bits: 64 });
            }
            value |= u64::from(b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecisionError::VarIntOverflow { bits: 64 })
    }

    pub fn read_string(&mut self) -> DecisionResult<String> {
        let len = self.read_vint()? as usize;
        self.ensure(len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_optional_string(&mut self) -> DecisionResult<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_string()?))
        } else {
            Ok(None)
        }
    }

    pub fn read_enum<E: WireEnum>(&mut self) -> DecisionResult<E> {
        let ordinal = self.read_u8()?;
        E::from_ordinal(ordinal).ok_or(DecisionError::UnknownOrdinal {
            kind: E::KIND,
            ordinal,
        })
    }

    pub fn read_optional_enum<E: WireEnum>(&mut self) -> DecisionResult<Option<E>> {
        if self.read_bool()? {
            Ok(Some(self.read_enum()?))
        } else {
            Ok(None)
        }
    }

    pub fn read_optional<T: Readable>(&mut self) -> DecisionResult<Option<T>> {
        if self.read_bool()? {
            Ok(Some(T::read_from(self)?))
        } else {
            Ok(None)
        }
    }

    pub fn read_list<T: Readable>(&mut self) -> DecisionResult<Vec<T>> {
        let count = self.read_vint()? as usize;
        // Every element takes at least one byte, so the remaining length
        // bounds the allocation even for a corrupt count.
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(T::read_from(self)?);
        }
        Ok(items)
    }
}

// ── Framing ───────────────────────────────────────────────────────

/// Encode a record with the frame header.
pub fn encode_frame<T: Writeable>(value: &T) -> Bytes {
    let mut body = StreamOutput::new();
    value.write_to(&mut body);
    let body = body.into_bytes();

    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    out.put_slice(&FRAME_MAGIC);
    out.put_u16(WIRE_VERSION);
    out.put_u32(u32::try_from(body.len()).unwrap_or(u32::MAX));
    out.put_slice(&body);
    out.freeze()
}

/// Decode a framed record, rejecting bad headers and trailing bytes.
pub fn decode_frame<T: Readable>(bytes: &[u8]) -> DecisionResult<T> {
    let mut input = StreamInput::new(bytes);
    input.ensure(FRAME_HEADER_LEN)?;

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&input.buf[..4]);
    input.buf.advance(4);
    if magic != FRAME_MAGIC {
        return Err(DecisionError::BadMagic(magic));
    }

    let version = input.read_u16()?;
    if version != WIRE_VERSION {
        return Err(DecisionError::UnsupportedVersion(version));
    }

    let declared = input.read_u32()? as usize;
    if declared != input.remaining() {
        return Err(DecisionError::LengthMismatch {
            declared,
            actual: input.remaining(),
        });
    }

    let value = T::read_from(&mut input)?;
    if input.remaining() > 0 {
        return Err(DecisionError::TrailingBytes(input.remaining()));
    }
    Ok(value)
}

// ── Node descriptor ───────────────────────────────────────────────

impl Writeable for DiscoveryNode {
    fn write_to(&self, out: &mut StreamOutput) {
        out.write_string(&self.id);
        out.write_string(&self.name);
        out.write_string(&self.address);
        out.write_len(self.attributes.len());
        for (k, v) in &self.attributes {
            out.write_string(k);
            out.write_string(v);
        }
    }
}

impl Readable for DiscoveryNode {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        let mut node = DiscoveryNode::new(
            input.read_string()?,
            input.read_string()?,
            input.read_string()?,
        );
        let count = input.read_vint()?;
        for _ in 0..count {
            let key = input.read_string()?;
            let value = input.read_string()?;
            node.attributes.insert(key, value);
        }
        Ok(node)
    }
}
