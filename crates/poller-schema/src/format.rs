//! Typed rendering of protocol values.

use crate::hint::render_octets;
use crate::schema::Schema;
use poller_types::{BaseType, MetricValue, Oid, SnmpValue, TypeInfo};

impl Schema {
    /// Renders an object path as `name` or `name.instance`.
    pub fn name_for_oid(&self, oid: &Oid) -> Option<String> {
        let (object, rest) = self.object_by_oid(oid)?;
        if rest.is_empty() {
            Some(object.name.clone())
        } else {
            Some(format!("{}.{}", object.name, Oid::render_arcs(rest)))
        }
    }

    /// Converts a raw value into the scalar emitted downstream, using the
    /// object's type information when available.
    pub fn render_value(&self, type_info: Option<&TypeInfo>, value: &SnmpValue) -> MetricValue {
        let Some(info) = type_info else {
            return MetricValue::from(value);
        };

        match info.base {
            BaseType::Enum => match value.as_i64() {
                Some(v) => match info.enum_label(v) {
                    Some(label) => MetricValue::Text(label.to_string()),
                    None => MetricValue::Integer(v),
                },
                None => MetricValue::from(value),
            },
            BaseType::Bits => match value.as_bytes() {
                Some(octets) => MetricValue::Text(info.bit_labels(octets).join(" ")),
                None => MetricValue::from(value),
            },
            BaseType::ObjectIdentifier => match value {
                SnmpValue::ObjectIdentifier(oid) => MetricValue::Text(
                    self.name_for_oid(oid).unwrap_or_else(|| oid.to_string()),
                ),
                other => MetricValue::from(other),
            },
            BaseType::OctetString | BaseType::Opaque => match value.as_bytes() {
                Some(octets) => {
                    let rendered = info
                        .format
                        .as_deref()
                        .and_then(|hint| render_octets(hint, octets))
                        .unwrap_or_else(|| String::from_utf8_lossy(octets).into_owned());
                    MetricValue::Text(rendered)
                }
                None => MetricValue::from(value),
            },
            BaseType::Unknown | BaseType::Pointer => MetricValue::Text(value.to_string()),
            _ => MetricValue::from(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::module::ModuleSource;
    use crate::schema::Schema;
    use poller_types::{BaseType, MetricValue, SnmpValue, TypeInfo};
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::from_sources([ModuleSource::from_yaml_str(
            r#"
module: FMT-MIB
objects:
  - name: ifEntry
    oid: 1.3.6.1.2.1.2.2.1
    kind: row
  - name: ifIndex
    oid: ifEntry.1
    kind: column
"#,
        )
        .unwrap()])
        .unwrap()
    }

    #[test]
    fn test_untyped_values() {
        let schema = schema();
        assert_eq!(
            schema.render_value(None, &SnmpValue::OctetString(b"xe-0/0/1".to_vec())),
            MetricValue::Text("xe-0/0/1".into())
        );
        assert_eq!(
            schema.render_value(None, &SnmpValue::Counter32(12)),
            MetricValue::Unsigned(12)
        );
        assert_eq!(
            schema.render_value(None, &SnmpValue::Boolean(true)),
            MetricValue::Bool(true)
        );
    }

    #[test]
    fn test_enum_labels() {
        let schema = schema();
        let mut info = TypeInfo::new(BaseType::Enum);
        info.enums.insert(1, "up".into());
        info.enums.insert(2, "down".into());

        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::Integer(2)),
            MetricValue::Text("down".into())
        );
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::Integer(7)),
            MetricValue::Integer(7)
        );
    }

    #[test]
    fn test_bits() {
        let schema = schema();
        let mut info = TypeInfo::new(BaseType::Bits);
        info.bits.insert(0, "a".into());
        info.bits.insert(2, "c".into());
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::OctetString(vec![0xA0])),
            MetricValue::Text("a c".into())
        );
    }

    #[test]
    fn test_object_identifier_names() {
        let schema = schema();
        let info = TypeInfo::new(BaseType::ObjectIdentifier);
        let value = SnmpValue::ObjectIdentifier("1.3.6.1.2.1.2.2.1.1.3".parse().unwrap());
        assert_eq!(
            schema.render_value(Some(&info), &value),
            MetricValue::Text("ifIndex.3".into())
        );

        let unknown = SnmpValue::ObjectIdentifier("1.3.6.1.4.1.9.1.1".parse().unwrap());
        assert_eq!(
            schema.render_value(Some(&info), &unknown),
            MetricValue::Text("1.3.6.1.4.1.9.1.1".into())
        );
    }

    #[test]
    fn test_octet_string_hints() {
        let schema = schema();
        let mut info = TypeInfo::new(BaseType::OctetString);
        info.format = Some("1x:".into());
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::OctetString(vec![0, 0x1b, 0xff])),
            MetricValue::Text("00:1b:ff".into())
        );

        info.format = None;
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::OctetString(b"plain".to_vec())),
            MetricValue::Text("plain".into())
        );
    }

    #[test]
    fn test_numeric_types_stay_numbers() {
        let schema = schema();
        let mut info = TypeInfo::new(BaseType::Integer32);
        info.format = Some("d-2".into());
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::Integer(1234)),
            MetricValue::Integer(1234)
        );
        let info = TypeInfo::new(BaseType::Counter64);
        assert_eq!(
            schema.render_value(Some(&info), &SnmpValue::Counter64(1 << 40)),
            MetricValue::Unsigned(1 << 40)
        );
    }
}
