//! SNMPv2c messages and PDUs.

use crate::ber::{self, Reader};
use crate::error::{Result, SnmpError};
use poller_types::{SnmpValue, VarBind};

/// Version field value for SNMPv2c.
pub const VERSION_2C: i64 = 1;

/// PDU types this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    GetBulkRequest,
}

impl PduType {
    pub fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xa0,
            PduType::GetNextRequest => 0xa1,
            PduType::Response => 0xa2,
            PduType::GetBulkRequest => 0xa5,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0xa0 => Ok(PduType::GetRequest),
            0xa1 => Ok(PduType::GetNextRequest),
            0xa2 => Ok(PduType::Response),
            0xa5 => Ok(PduType::GetBulkRequest),
            other => Err(SnmpError::decode(format!("unsupported PDU type 0x{:02x}", other))),
        }
    }
}

/// A protocol data unit.
///
/// For GetBulk requests `error_status` carries non-repeaters and
/// `error_index` carries max-repetitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Builds a request whose varbinds all carry NULL values.
    pub fn request(pdu_type: PduType, request_id: i32, oids: &[poller_types::Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids
                .iter()
                .map(|oid| VarBind::new(oid.clone(), SnmpValue::Null))
                .collect(),
        }
    }

    pub fn get_bulk(
        request_id: i32,
        oids: &[poller_types::Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Self {
        let mut pdu = Self::request(PduType::GetBulkRequest, request_id, oids);
        pdu.error_status = i64::from(non_repeaters);
        pdu.error_index = i64::from(max_repetitions);
        pdu
    }
}

/// A community-based message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    pub fn new(community: &[u8], pdu: Pdu) -> Self {
        Self {
            version: VERSION_2C,
            community: community.to_vec(),
            pdu,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut varbinds = Vec::with_capacity(self.pdu.varbinds.len() * 16);
        for vb in &self.pdu.varbinds {
            let mut inner = Vec::with_capacity(32);
            ber::write_tlv(&mut inner, ber::TAG_OID, &ber::encode_oid(&vb.oid)?);
            encode_value(&mut inner, &vb.value)?;
            ber::write_tlv(&mut varbinds, ber::TAG_SEQUENCE, &inner);
        }

        let mut pdu = Vec::with_capacity(varbinds.len() + 16);
        ber::write_tlv(
            &mut pdu,
            ber::TAG_INTEGER,
            &ber::encode_integer(i64::from(self.pdu.request_id)),
        );
        ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_integer(self.pdu.error_status));
        ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_integer(self.pdu.error_index));
        ber::write_tlv(&mut pdu, ber::TAG_SEQUENCE, &varbinds);

        let mut body = Vec::with_capacity(pdu.len() + self.community.len() + 8);
        ber::write_tlv(&mut body, ber::TAG_INTEGER, &ber::encode_integer(self.version));
        ber::write_tlv(&mut body, ber::TAG_OCTET_STRING, &self.community);
        ber::write_tlv(&mut body, self.pdu.pdu_type.tag(), &pdu);

        let mut out = Vec::with_capacity(body.len() + 4);
        ber::write_tlv(&mut out, ber::TAG_SEQUENCE, &body);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut outer = Reader::new(buf);
        let mut body = Reader::new(outer.expect(ber::TAG_SEQUENCE)?);

        let version = body.integer()?;
        if version != VERSION_2C {
            return Err(SnmpError::decode(format!("unsupported version {}", version)));
        }
        let community = body.expect(ber::TAG_OCTET_STRING)?.to_vec();

        let (tag, pdu_content) = body.read_tlv()?;
        let pdu_type = PduType::from_tag(tag)?;
        let mut pdu = Reader::new(pdu_content);
        let request_id = i32::try_from(pdu.integer()?)
            .map_err(|_| SnmpError::decode("request-id out of range"))?;
        let error_status = pdu.integer()?;
        let error_index = pdu.integer()?;

        let mut list = Reader::new(pdu.expect(ber::TAG_SEQUENCE)?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut vb = Reader::new(list.expect(ber::TAG_SEQUENCE)?);
            let oid = ber::decode_oid(vb.expect(ber::TAG_OID)?)?;
            let (value_tag, value_content) = vb.read_tlv()?;
            varbinds.push(VarBind::new(oid, decode_value(value_tag, value_content)?));
        }

        Ok(Self {
            version,
            community,
            pdu: Pdu {
                pdu_type,
                request_id,
                error_status,
                error_index,
                varbinds,
            },
        })
    }
}

fn encode_value(out: &mut Vec<u8>, value: &SnmpValue) -> Result<()> {
    match value {
        SnmpValue::Boolean(b) => ber::write_tlv(out, ber::TAG_BOOLEAN, &[if *b { 0xff } else { 0 }]),
        SnmpValue::Integer(v) => ber::write_tlv(out, ber::TAG_INTEGER, &ber::encode_integer(*v)),
        SnmpValue::OctetString(b) => ber::write_tlv(out, ber::TAG_OCTET_STRING, b),
        SnmpValue::Null => ber::write_tlv(out, ber::TAG_NULL, &[]),
        SnmpValue::ObjectIdentifier(oid) => {
            ber::write_tlv(out, ber::TAG_OID, &ber::encode_oid(oid)?)
        }
        SnmpValue::IpAddress(addr) => ber::write_tlv(out, ber::TAG_IP_ADDRESS, addr),
        SnmpValue::Counter32(v) => {
            ber::write_tlv(out, ber::TAG_COUNTER32, &ber::encode_unsigned(u64::from(*v)))
        }
        SnmpValue::Gauge32(v) => {
            ber::write_tlv(out, ber::TAG_GAUGE32, &ber::encode_unsigned(u64::from(*v)))
        }
        SnmpValue::TimeTicks(v) => {
            ber::write_tlv(out, ber::TAG_TIMETICKS, &ber::encode_unsigned(u64::from(*v)))
        }
        SnmpValue::Opaque(b) => ber::write_tlv(out, ber::TAG_OPAQUE, b),
        SnmpValue::Counter64(v) => {
            ber::write_tlv(out, ber::TAG_COUNTER64, &ber::encode_unsigned(*v))
        }
        SnmpValue::NoSuchObject => ber::write_tlv(out, ber::TAG_NO_SUCH_OBJECT, &[]),
        SnmpValue::NoSuchInstance => ber::write_tlv(out, ber::TAG_NO_SUCH_INSTANCE, &[]),
        SnmpValue::EndOfMibView => ber::write_tlv(out, ber::TAG_END_OF_MIB_VIEW, &[]),
    }
    Ok(())
}

fn decode_u32(content: &[u8]) -> Result<u32> {
    u32::try_from(ber::decode_unsigned(content)?)
        .map_err(|_| SnmpError::decode("32-bit value out of range"))
}

fn decode_value(tag: u8, content: &[u8]) -> Result<SnmpValue> {
    let value = match tag {
        ber::TAG_BOOLEAN => match content {
            [b] => SnmpValue::Boolean(*b != 0),
            _ => return Err(SnmpError::decode("boolean must be one octet")),
        },
        ber::TAG_INTEGER => SnmpValue::Integer(ber::decode_integer(content)?),
        ber::TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
        ber::TAG_NULL => SnmpValue::Null,
        ber::TAG_OID => SnmpValue::ObjectIdentifier(ber::decode_oid(content)?),
        ber::TAG_IP_ADDRESS => match content {
            [a, b, c, d] => SnmpValue::IpAddress([*a, *b, *c, *d]),
            _ => return Err(SnmpError::decode("IpAddress must be four octets")),
        },
        ber::TAG_COUNTER32 => SnmpValue::Counter32(decode_u32(content)?),
        ber::TAG_GAUGE32 => SnmpValue::Gauge32(decode_u32(content)?),
        ber::TAG_TIMETICKS => SnmpValue::TimeTicks(decode_u32(content)?),
        ber::TAG_OPAQUE => SnmpValue::Opaque(content.to_vec()),
        ber::TAG_COUNTER64 => SnmpValue::Counter64(ber::decode_unsigned(content)?),
        ber::TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        ber::TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        ber::TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        other => {
            return Err(SnmpError::decode(format!("unsupported value tag 0x{:02x}", other)))
        }
    };
    Ok(value)
}
