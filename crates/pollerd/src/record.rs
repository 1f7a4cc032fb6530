//! Result records handed to sinks.

use chrono::{DateTime, Utc};
use poller_types::MetricValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub target: String,

    /// Correlation token copied from the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Reply values keyed by path (`Raw`) or by element and object name
/// (`Resolved`, element `""` for scalars).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    Raw(BTreeMap<String, MetricValue>),
    Resolved(BTreeMap<String, BTreeMap<String, MetricValue>>),
}

impl RecordData {
    pub fn len(&self) -> usize {
        match self {
            RecordData::Raw(values) => values.len(),
            RecordData::Resolved(elements) => elements.values().map(BTreeMap::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value stored under a path in raw data.
    pub fn raw(&self, path: &str) -> Option<&MetricValue> {
        match self {
            RecordData::Raw(values) => values.get(path),
            RecordData::Resolved(_) => None,
        }
    }

    /// Value stored under `element`/`name` in resolved data.
    pub fn resolved(&self, element: &str, name: &str) -> Option<&MetricValue> {
        match self {
            RecordData::Resolved(elements) => elements.get(element)?.get(name),
            RecordData::Raw(_) => None,
        }
    }
}

/// One successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
    pub data: RecordData,
}

impl ResultRecord {
    pub fn new(metadata: Metadata, data: RecordData) -> Self {
        Self {
            timestamp: Utc::now(),
            metadata,
            data,
        }
    }
}
