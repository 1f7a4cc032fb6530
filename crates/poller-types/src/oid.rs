//! Object identifier type with safe parsing and SNMP ordering.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric object identifier such as `1.3.6.1.2.1.1.5.0`.
///
/// Ordering is lexicographic over the arcs, which is the order agents use
/// when answering GetNext/GetBulk requests.
///
/// # Examples
///
/// ```
/// use poller_types::Oid;
///
/// let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
/// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.5.0");
///
/// let sys_name: Oid = "1.3.6.1.2.1.1.5".parse().unwrap();
/// assert!(oid.is_descendant_of(&sys_name));
/// assert_eq!(oid.suffix_after(&sys_name), Some(&[0u32][..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Creates an OID from its arcs.
    pub fn new(arcs: Vec<u32>) -> Self {
        Oid(arcs)
    }

    /// Creates an OID by copying a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Oid(arcs.to_vec())
    }

    /// Returns the arcs of this OID.
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Returns the number of arcs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `prefix` is a prefix of (or equal to) this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns true if this OID lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Oid) -> bool {
        self.0.len() > ancestor.0.len() && self.starts_with(ancestor)
    }

    /// Returns the arcs following `prefix`, or `None` if `prefix` does not
    /// prefix this OID.
    pub fn suffix_after(&self, prefix: &Oid) -> Option<&[u32]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }

    /// Returns a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = Vec::with_capacity(self.0.len() + 1);
        arcs.extend_from_slice(&self.0);
        arcs.push(arc);
        Oid(arcs)
    }

    /// Returns a new OID with all of `suffix` appended.
    pub fn join(&self, suffix: &[u32]) -> Oid {
        let mut arcs = Vec::with_capacity(self.0.len() + suffix.len());
        arcs.extend_from_slice(&self.0);
        arcs.extend_from_slice(suffix);
        Oid(arcs)
    }

    /// Renders a list of arcs the way instance suffixes are printed.
    pub fn render_arcs(arcs: &[u32]) -> String {
        let mut out = String::with_capacity(arcs.len() * 3);
        for (i, arc) in arcs.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&arc.to_string());
        }
        out
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Oid::render_arcs(&self.0))
    }
}

impl FromStr for Oid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // net-snmp style leading dot is accepted
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(ParseError::InvalidOid(s.to_string()));
        }

        let arcs = trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseError::InvalidOid(s.to_string()))?;

        Ok(Oid(arcs))
    }
}

impl TryFrom<String> for Oid {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> String {
        oid.to_string()
    }
}

impl From<Vec<u32>> for Oid {
    fn from(arcs: Vec<u32>) -> Self {
        Oid(arcs)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid::from_slice(arcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_with_and_without_leading_dot() {
        let a: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        let b: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.arcs(), &[1, 3, 6, 1, 2, 1, 1, 5, 0]);
    }

    #[test]
    fn test_invalid_format() {
        assert!("".parse::<Oid>().is_err());
        assert!(".".parse::<Oid>().is_err());
        assert!("1..3".parse::<Oid>().is_err());
        assert!("1.3.".parse::<Oid>().is_err());
        assert!("1.3.x".parse::<Oid>().is_err());
        assert!("1.3.99999999999".parse::<Oid>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let oid = Oid::new(vec![1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.31.1.1.1.1");
        assert_eq!(oid.to_string().parse::<Oid>().unwrap(), oid);
        assert_eq!(Oid::default().to_string(), "");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a: Oid = "1.3.6.1.2.1.2.2.1.2".parse().unwrap();
        let b: Oid = "1.3.6.1.2.1.2.2.1.2.1".parse().unwrap();
        let c: Oid = "1.3.6.1.2.1.2.2.1.10".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_prefix_relations() {
        let column: Oid = "1.3.6.1.2.1.31.1.1.1.1".parse().unwrap();
        let cell = column.child(17);
        assert!(cell.starts_with(&column));
        assert!(cell.is_descendant_of(&column));
        assert!(column.starts_with(&column));
        assert!(!column.is_descendant_of(&column));
        assert_eq!(cell.suffix_after(&column), Some(&[17u32][..]));

        // 1.3.6.1.2.1.31.1.1.1.10 is not below ...1.1 even though the
        // rendered string shares the prefix
        let sibling: Oid = "1.3.6.1.2.1.31.1.1.1.10".parse().unwrap();
        assert!(!sibling.starts_with(&column));
        assert_eq!(sibling.suffix_after(&column), None);
    }

    #[test]
    fn test_join() {
        let base: Oid = "1.3.6".parse().unwrap();
        assert_eq!(base.join(&[1, 2]).to_string(), "1.3.6.1.2");
        assert_eq!(Oid::render_arcs(&[10, 0]), "10.0");
    }

    #[test]
    fn test_serde_as_string() {
        let oid: Oid = "1.3.6.1".parse().unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, "\"1.3.6.1\"");
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
        assert!(serde_json::from_str::<Oid>("\"1.x\"").is_err());
    }
}
