//! Turns reply varbinds into record data.

use crate::index_map::IndexMap;
use crate::order::ResultShape;
use crate::record::RecordData;
use poller_schema::Resolver;
use poller_types::{MetricValue, Oid, VarBind};
use std::collections::BTreeMap;
use tracing::warn;

/// Collects the replies of one order.
///
/// Every reply path is resolved again against the schema to find its type
/// and object name. In resolved shape the instance trailer becomes the
/// element, with the index map's name substituted for a known index.
pub struct ReplyShaper<'a> {
    resolver: &'a Resolver,
    map: Option<&'a IndexMap>,
    data: RecordData,
}

impl<'a> ReplyShaper<'a> {
    /// `shape` must already be settled; `Auto` is treated as `Resolved`.
    pub fn new(resolver: &'a Resolver, shape: ResultShape, map: Option<&'a IndexMap>) -> Self {
        let data = match shape {
            ResultShape::Raw => RecordData::Raw(BTreeMap::new()),
            ResultShape::Auto | ResultShape::Resolved => RecordData::Resolved(BTreeMap::new()),
        };
        Self {
            resolver,
            map,
            data,
        }
    }

    pub fn visit(&mut self, vb: VarBind) {
        let node = self.resolver.resolve_oid(&vb.oid);
        let value = match &node {
            Ok(node) => self
                .resolver
                .schema()
                .render_value(node.type_info.as_deref(), &vb.value),
            Err(_) => MetricValue::from(&vb.value),
        };

        match &mut self.data {
            RecordData::Raw(values) => {
                values.insert(vb.oid.to_string(), value);
            }
            RecordData::Resolved(elements) => {
                let (element, name) = match node {
                    Ok(node) => {
                        let element = if node.is_scalar() {
                            String::new()
                        } else {
                            element_for(node.instance(), self.map)
                        };
                        (element, node.name)
                    }
                    Err(e) => {
                        warn!(oid = %vb.oid, error = %e, "lookup failed, storing raw path");
                        (String::new(), vb.oid.to_string())
                    }
                };
                elements.entry(element).or_default().insert(name, value);
            }
        }
    }

    pub fn finish(self) -> RecordData {
        self.data
    }
}

/// Element name for an instance trailer.
fn element_for(trailer: &[u32], map: Option<&IndexMap>) -> String {
    if let (Some(map), [index]) = (map, trailer) {
        if let Some(name) = map.name(*index) {
            return name.to_string();
        }
    }
    Oid::render_arcs(trailer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poller_schema::{ModuleSource, Schema};
    use poller_types::{Node, ObjectKind, SnmpValue};
    use pretty_assertions::assert_eq;

    fn resolver() -> Resolver {
        let src = ModuleSource::from_yaml_str(
            r#"
module: TEST-MIB
objects:
  - name: system
    oid: 1.3.6.1.2.1.1
  - name: sysName
    oid: system.5
    kind: scalar
    type: OctetString
  - name: ifEntry
    oid: 1.3.6.1.2.1.2.2.1
    kind: row
  - name: ifOperStatus
    oid: ifEntry.8
    kind: column
    values:
      up: 1
      down: 2
  - name: ifXEntry
    oid: 1.3.6.1.2.1.31.1.1.1
    kind: row
  - name: ifHCInOctets
    oid: ifXEntry.6
    kind: column
    type: Counter64
"#,
        )
        .unwrap();
        Resolver::new(Schema::from_sources([src]).unwrap())
    }

    fn vb(path: &str, value: SnmpValue) -> VarBind {
        VarBind::new(path.parse().unwrap(), value)
    }

    fn if_map() -> IndexMap {
        let mut map = IndexMap::new(Node {
            key: "ifName".into(),
            name: "ifName".into(),
            module: "IF-MIB".into(),
            numeric: "1.3.6.1.2.1.31.1.1.1.1".parse().unwrap(),
            qualified: None,
            kind: ObjectKind::Column,
            type_info: None,
            lookedup: true,
        });
        map.insert(1, "ge-0/0/0".into());
        map.insert(2, "xe-0/0/0".into());
        map
    }

    #[test]
    fn test_raw_shape_is_flat() {
        let resolver = resolver();
        let mut shaper = ReplyShaper::new(&resolver, ResultShape::Raw, None);
        shaper.visit(vb("1.3.6.1.2.1.1.5.0", SnmpValue::OctetString(b"router1".to_vec())));
        shaper.visit(vb("1.3.6.1.4.1.9.9.1", SnmpValue::Integer(7)));

        let data = shaper.finish();
        assert_eq!(data.raw("1.3.6.1.2.1.1.5.0"), Some(&MetricValue::from("router1")));
        assert_eq!(data.raw("1.3.6.1.4.1.9.9.1"), Some(&MetricValue::Integer(7)));
    }

    #[test]
    fn test_scalar_goes_to_empty_element() {
        let resolver = resolver();
        let mut shaper = ReplyShaper::new(&resolver, ResultShape::Resolved, None);
        shaper.visit(vb("1.3.6.1.2.1.1.5.0", SnmpValue::OctetString(b"router1".to_vec())));
        let data = shaper.finish();
        assert_eq!(data.resolved("", "sysName"), Some(&MetricValue::from("router1")));
    }

    #[test]
    fn test_trailer_uses_index_map() {
        let resolver = resolver();
        let map = if_map();
        let mut shaper = ReplyShaper::new(&resolver, ResultShape::Resolved, Some(&map));
        shaper.visit(vb("1.3.6.1.2.1.31.1.1.1.6.1", SnmpValue::Counter64(1000)));
        shaper.visit(vb("1.3.6.1.2.1.31.1.1.1.6.9", SnmpValue::Counter64(9)));
        shaper.visit(vb("1.3.6.1.2.1.2.2.1.8.2", SnmpValue::Integer(2)));

        let data = shaper.finish();
        assert_eq!(
            data.resolved("ge-0/0/0", "ifHCInOctets"),
            Some(&MetricValue::Unsigned(1000))
        );
        // unknown index stays numeric
        assert_eq!(data.resolved("9", "ifHCInOctets"), Some(&MetricValue::Unsigned(9)));
        assert_eq!(data.resolved("xe-0/0/0", "ifOperStatus"), Some(&MetricValue::from("down")));
    }

    #[test]
    fn test_trailer_without_map_stays_literal() {
        let resolver = resolver();
        let mut shaper = ReplyShaper::new(&resolver, ResultShape::Resolved, None);
        shaper.visit(vb("1.3.6.1.2.1.31.1.1.1.6.4.7", SnmpValue::Counter64(5)));
        let data = shaper.finish();
        assert_eq!(data.resolved("4.7", "ifHCInOctets"), Some(&MetricValue::Unsigned(5)));
    }

    #[test]
    fn test_unknown_path_keeps_raw_name() {
        let resolver = resolver();
        let mut shaper = ReplyShaper::new(&resolver, ResultShape::Resolved, None);
        shaper.visit(vb("1.3.6.1.4.1.2636.3.1", SnmpValue::Gauge32(3)));
        let data = shaper.finish();
        assert_eq!(
            data.resolved("", "1.3.6.1.4.1.2636.3.1"),
            Some(&MetricValue::Unsigned(3))
        );
    }
}
