//! Resolution against the module files shipped in the repository.

use poller_schema::{Resolver, Schema};
use poller_types::{BaseType, MetricValue, ObjectKind, SnmpValue};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../schema")
}

fn resolver() -> Resolver {
    let schema = Schema::load(&[schema_dir()], &["SNMPv2-MIB", "IF-MIB", "ENTITY-MIB"]).unwrap();
    Resolver::new(schema)
}

#[test]
fn test_modules_load_with_imports() {
    let schema = Schema::load(&[schema_dir()], &["IF-MIB"]).unwrap();
    assert_eq!(
        schema.modules(),
        &[
            "SNMPv2-SMI".to_string(),
            "SNMPv2-TC".to_string(),
            "SNMPv2-MIB".to_string(),
            "IF-MIB".to_string(),
        ]
    );
}

#[test]
fn test_well_known_objects() {
    let resolver = resolver();

    let sys_name = resolver.lookup("sysName").unwrap();
    assert_eq!(sys_name.numeric.to_string(), "1.3.6.1.2.1.1.5");
    assert_eq!(sys_name.kind, ObjectKind::Scalar);

    let if_name = resolver.lookup("ifName").unwrap();
    assert_eq!(if_name.numeric.to_string(), "1.3.6.1.2.1.31.1.1.1.1");
    assert_eq!(if_name.kind, ObjectKind::Column);

    let hc_in = resolver.lookup("ifHCInOctets").unwrap();
    assert_eq!(hc_in.numeric.to_string(), "1.3.6.1.2.1.31.1.1.1.6");
    assert_eq!(hc_in.base_type(), BaseType::Counter64);

    let model = resolver.lookup("entPhysicalModelName.1").unwrap();
    assert_eq!(
        model.request_oid().to_string(),
        "1.3.6.1.2.1.47.1.1.1.1.13.1"
    );
}

#[test]
fn test_numeric_lookup_finds_column() {
    let resolver = resolver();
    let node = resolver.lookup("1.3.6.1.2.1.2.2.1.8.17").unwrap();
    assert_eq!(node.name, "ifOperStatus");
    assert_eq!(node.instance(), &[17]);
    assert!(!node.lookedup);
}

#[test]
fn test_typed_rendering() {
    let resolver = resolver();
    let schema = resolver.schema();

    let oper = resolver.lookup("ifOperStatus").unwrap();
    assert_eq!(
        schema.render_value(oper.type_info.as_deref(), &SnmpValue::Integer(7)),
        MetricValue::Text("lowerLayerDown".into())
    );

    let phys = resolver.lookup("ifPhysAddress").unwrap();
    assert_eq!(
        schema.render_value(
            phys.type_info.as_deref(),
            &SnmpValue::OctetString(vec![0x00, 0x05, 0x86, 0x71, 0x2b, 0xc0])
        ),
        MetricValue::Text("00:05:86:71:2b:c0".into())
    );

    let object_id = resolver.lookup("sysObjectID").unwrap();
    assert_eq!(
        schema.render_value(
            object_id.type_info.as_deref(),
            &SnmpValue::ObjectIdentifier("1.3.6.1.2.1.2.2.1.1.5".parse().unwrap())
        ),
        MetricValue::Text("ifIndex.5".into())
    );
}

#[test]
fn test_concurrent_lookups_query_once() {
    let resolver = Arc::new(resolver());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.lookup("ifHCOutOctets.3").unwrap())
        })
        .collect();

    let nodes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(nodes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(resolver.queries(), 1);
}
