//! Minimal BER primitives for SNMP messages.
//!
//! Only definite lengths are supported. Decoding never panics; every
//! malformed input becomes [`SnmpError::Decode`].

use crate::error::{Result, SnmpError};
use poller_types::Oid;

pub(crate) const TAG_BOOLEAN: u8 = 0x01;
pub(crate) const TAG_INTEGER: u8 = 0x02;
pub(crate) const TAG_OCTET_STRING: u8 = 0x04;
pub(crate) const TAG_NULL: u8 = 0x05;
pub(crate) const TAG_OID: u8 = 0x06;
pub(crate) const TAG_SEQUENCE: u8 = 0x30;
pub(crate) const TAG_IP_ADDRESS: u8 = 0x40;
pub(crate) const TAG_COUNTER32: u8 = 0x41;
pub(crate) const TAG_GAUGE32: u8 = 0x42;
pub(crate) const TAG_TIMETICKS: u8 = 0x43;
pub(crate) const TAG_OPAQUE: u8 = 0x44;
pub(crate) const TAG_COUNTER64: u8 = 0x46;
pub(crate) const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub(crate) const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub(crate) const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Appends `tag`, the length of `content` and `content` to `out`.
pub(crate) fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Minimal two's complement encoding.
pub(crate) fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Minimal unsigned encoding, with a leading zero octet when the high bit
/// would otherwise read as a sign.
pub(crate) fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|b| **b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

pub(crate) fn encode_oid(oid: &Oid) -> Result<Vec<u8>> {
    let arcs = oid.arcs();
    let (first, rest) = match arcs {
        [] => return Err(SnmpError::Encode("empty object identifier".into())),
        [a] => (u64::from(*a) * 40, &arcs[1..]),
        [a, b, ..] => {
            if *a > 2 || (*a < 2 && *b >= 40) {
                return Err(SnmpError::Encode(format!("invalid object identifier {}", oid)));
            }
            (u64::from(*a) * 40 + u64::from(*b), &arcs[2..])
        }
    };

    let mut out = Vec::with_capacity(arcs.len() + 4);
    write_base128(&mut out, first);
    for arc in rest {
        write_base128(&mut out, u64::from(*arc));
    }
    Ok(out)
}

fn write_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut tmp = [0u8; 10];
    let mut n = 0;
    loop {
        tmp[n] = (value & 0x7f) as u8;
        value >>= 7;
        n += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(tmp[i] | continuation);
    }
}

pub(crate) fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::decode(format!(
            "integer of {} octets",
            content.len()
        )));
    }
    let negative = content[0] & 0x80 != 0;
    let init: i64 = if negative { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(init, |acc, b| (acc << 8) | i64::from(*b)))
}

pub(crate) fn decode_unsigned(content: &[u8]) -> Result<u64> {
    let content = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::decode(format!(
            "unsigned integer of {} octets",
            content.len()
        )));
    }
    Ok(content.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

pub(crate) fn decode_oid(content: &[u8]) -> Result<Oid> {
    if content.is_empty() {
        return Err(SnmpError::decode("empty object identifier"));
    }

    let mut subids = Vec::with_capacity(content.len() + 1);
    let mut value: u64 = 0;
    let mut pending = false;
    for &b in content {
        if value > (u64::MAX >> 7) {
            return Err(SnmpError::decode("object identifier arc overflow"));
        }
        value = (value << 7) | u64::from(b & 0x7f);
        pending = true;
        if b & 0x80 == 0 {
            subids.push(value);
            value = 0;
            pending = false;
        }
    }
    if pending {
        return Err(SnmpError::decode("truncated object identifier"));
    }

    let mut arcs = Vec::with_capacity(subids.len() + 1);
    let first = subids[0];
    let (a, b): (u32, u64) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    arcs.push(a);
    arcs.push(to_arc(b)?);
    for sub in &subids[1..] {
        arcs.push(to_arc(*sub)?);
    }
    Ok(Oid::new(arcs))
}

fn to_arc(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| SnmpError::decode("object identifier arc out of range"))
}

/// Cursor over a BER encoded buffer.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| SnmpError::decode("unexpected end of message"))?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let octets = usize::from(first & 0x7f);
        if octets == 0 || octets > 4 {
            return Err(SnmpError::decode(format!(
                "unsupported length form 0x{:02x}",
                first
            )));
        }
        let mut len = 0usize;
        for _ in 0..octets {
            len = (len << 8) | usize::from(self.byte()?);
        }
        Ok(len)
    }

    /// Reads one TLV and returns its tag and content.
    pub(crate) fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                SnmpError::decode(format!("length {} exceeds remaining message", len))
            })?;
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    /// Reads one TLV and checks its tag.
    pub(crate) fn expect(&mut self, tag: u8) -> Result<&'a [u8]> {
        let (got, content) = self.read_tlv()?;
        if got != tag {
            return Err(SnmpError::decode(format!(
                "expected tag 0x{:02x}, got 0x{:02x}",
                tag, got
            )));
        }
        Ok(content)
    }

    pub(crate) fn integer(&mut self) -> Result<i64> {
        decode_integer(self.expect(TAG_INTEGER)?)
    }
}
