//! Poll orders as received from the work queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key used for element lookups when an order names none.
pub const DEFAULT_MAP_KEY: &str = "ifName";

/// What an order asks the engine to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    /// Walk each identifier's subtree.
    #[default]
    Walk,
    /// Fetch exactly the given instances.
    Get,
    /// Fetch each identifier for every index whose name matches a pattern.
    GetElements,
    /// Rebuild the index map.
    BuildMap,
    /// Drop cached index maps.
    ClearMap,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Walk => "Walk",
            Mode::Get => "Get",
            Mode::GetElements => "GetElements",
            Mode::BuildMap => "BuildMap",
            Mode::ClearMap => "ClearMap",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "walk" => Ok(Mode::Walk),
            "get" => Ok(Mode::Get),
            "getelements" | "getbyelements" => Ok(Mode::GetElements),
            "buildmap" => Ok(Mode::BuildMap),
            "clearmap" => Ok(Mode::ClearMap),
            _ => Err(format!("invalid mode: {}", s)),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

/// How replies are keyed in the result record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResultShape {
    /// Resolved if any identifier was symbolic, raw otherwise.
    #[default]
    Auto,
    /// `data[path] = value`
    Raw,
    /// `data[element][name] = value`
    Resolved,
}

impl ResultShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultShape::Auto => "Auto",
            ResultShape::Raw => "OID",
            ResultShape::Resolved => "Resolve",
        }
    }

    /// Settles `Auto` given whether any identifier was symbolic.
    pub fn effective(self, any_symbolic: bool) -> ResultShape {
        match self {
            ResultShape::Auto if any_symbolic => ResultShape::Resolved,
            ResultShape::Auto => ResultShape::Raw,
            explicit => explicit,
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ResultShape::Auto),
            "oid" | "raw" => Ok(ResultShape::Raw),
            "resolve" | "resolved" => Ok(ResultShape::Resolved),
            _ => Err(format!("invalid resolver mode: {}", s)),
        }
    }
}

impl TryFrom<String> for ResultShape {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResultShape> for String {
    fn from(shape: ResultShape) -> Self {
        shape.as_str().to_string()
    }
}

/// One unit of work.
///
/// Field names are accepted in lower case or in the capitalised form
/// older publishers use (`Target`, `Oids`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(alias = "Target")]
    pub target: String,

    #[serde(default, alias = "Oids", alias = "OIDs")]
    pub oids: Vec<String>,

    /// Unanchored regular expressions matched against index map names.
    #[serde(default, alias = "Elements", skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,

    #[serde(default, alias = "Key", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, alias = "Mode")]
    pub mode: Mode,

    #[serde(default, alias = "Community", skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,

    #[serde(default, alias = "ID", alias = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, alias = "Result")]
    pub result: ResultShape,
}

impl Order {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Index map key, treating an empty string as unset.
    pub fn map_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Community override, treating an empty string as unset.
    pub fn community_override(&self) -> Option<&str> {
        self.community.as_deref().filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_order() {
        let order = Order::from_json(br#"{"target": "10.0.0.1", "oids": ["sysName"], "mode": "get"}"#)
            .unwrap();
        assert_eq!(order.target, "10.0.0.1");
        assert_eq!(order.oids, vec!["sysName"]);
        assert_eq!(order.mode, Mode::Get);
        assert_eq!(order.result, ResultShape::Auto);
        assert_eq!(order.map_key(), None);
    }

    #[test]
    fn test_parse_capitalised_fields() {
        let order = Order::from_json(
            br#"{
                "Target": "192.0.2.7",
                "Oids": ["ifHCInOctets", "ifHCOutOctets"],
                "Elements": ["^ge-", "^xe-"],
                "Key": "ifName",
                "Mode": "GetElements",
                "Community": "secret",
                "ID": "job-17",
                "Result": "Resolve"
            }"#,
        )
        .unwrap();
        assert_eq!(order.target, "192.0.2.7");
        assert_eq!(order.elements.len(), 2);
        assert_eq!(order.map_key(), Some("ifName"));
        assert_eq!(order.mode, Mode::GetElements);
        assert_eq!(order.community_override(), Some("secret"));
        assert_eq!(order.id.as_deref(), Some("job-17"));
        assert_eq!(order.result, ResultShape::Resolved);
    }

    #[test]
    fn test_mode_strings() {
        for (text, mode) in [
            ("walk", Mode::Walk),
            ("WALK", Mode::Walk),
            ("Get", Mode::Get),
            ("getelements", Mode::GetElements),
            ("GetByElements", Mode::GetElements),
            ("BuildMap", Mode::BuildMap),
            ("clearmap", Mode::ClearMap),
        ] {
            assert_eq!(text.parse::<Mode>().unwrap(), mode, "{}", text);
        }
        assert!("bulk".parse::<Mode>().is_err());
        assert!(Order::from_json(br#"{"target": "x", "mode": "poll"}"#).is_err());
    }

    #[test]
    fn test_result_shape_strings() {
        assert_eq!("OID".parse::<ResultShape>().unwrap(), ResultShape::Raw);
        assert_eq!("resolve".parse::<ResultShape>().unwrap(), ResultShape::Resolved);
        assert_eq!("Auto".parse::<ResultShape>().unwrap(), ResultShape::Auto);
        assert!("pretty".parse::<ResultShape>().is_err());
    }

    #[test]
    fn test_effective_shape() {
        assert_eq!(ResultShape::Auto.effective(true), ResultShape::Resolved);
        assert_eq!(ResultShape::Auto.effective(false), ResultShape::Raw);
        assert_eq!(ResultShape::Raw.effective(true), ResultShape::Raw);
        assert_eq!(ResultShape::Resolved.effective(false), ResultShape::Resolved);
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let order = Order::from_json(br#"{"target": "x", "key": "", "community": ""}"#).unwrap();
        assert_eq!(order.map_key(), None);
        assert_eq!(order.community_override(), None);
    }

    #[test]
    fn test_serialize_round_trip_keeps_mode_names() {
        let order = Order {
            target: "10.0.0.1".into(),
            oids: vec!["sysName".into()],
            mode: Mode::Get,
            ..Order::default()
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["mode"], "Get");
        assert_eq!(json["result"], "Auto");
        assert!(json.get("key").is_none());
    }
}
