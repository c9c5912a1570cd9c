//! Record, identifier and query shapes.
//!
//! # Responsibility
//! - Define the persisted record envelope shared by every model.
//! - Define query criteria and pagination options.
//!
//! # Invariants
//! - `RecordId` is never blank.
//! - Store-generated ids are 24 lowercase hex characters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Free-form record attributes.
pub type Attributes = Map<String, Value>;

const GENERATED_ID_LEN: usize = 24;

/// Opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Parses a caller-supplied identifier.
    ///
    /// Returns `None` for blank input; surrounding whitespace is dropped.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Generates a fresh ObjectId-shaped identifier.
    pub fn generate() -> Self {
        let mut hex = Uuid::new_v4().simple().to_string();
        hex.truncate(GENERATED_ID_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for RecordId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "record id cannot be blank".to_string())
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted instance of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Name of the model this record belongs to.
    pub model: String,
    pub attributes: Attributes,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Record {
    /// Returns one attribute value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Record selection used by find/update/destroy.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Criteria {
    /// Every record of the model.
    #[default]
    All,
    /// Exactly the record with this id.
    Id(RecordId),
    /// Records whose attributes contain every given key with an equal value.
    Where(Attributes),
}

impl Criteria {
    /// Builds an equality filter from a JSON object.
    ///
    /// `{}` selects every record; non-object values return `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.is_empty() => Some(Self::All),
            Value::Object(map) => Some(Self::Where(map)),
            _ => None,
        }
    }

    /// Returns whether `record` satisfies this criteria.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => &record.id == id,
            Self::Where(filter) => filter
                .iter()
                .all(|(key, expected)| record.attributes.get(key) == Some(expected)),
        }
    }
}

/// Pagination options applied after criteria filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl QueryOptions {
    /// Applies offset then limit to an already ordered list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset as usize;
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Criteria, QueryOptions, Record, RecordId};
    use serde_json::json;

    fn record(id: &str, attributes: serde_json::Value) -> Record {
        Record {
            id: RecordId::parse(id).unwrap(),
            model: "User".to_string(),
            attributes: attributes.as_object().cloned().unwrap(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn parse_rejects_blank_and_trims() {
        assert!(RecordId::parse("").is_none());
        assert!(RecordId::parse("   ").is_none());
        assert_eq!(RecordId::parse(" 42 ").unwrap().as_str(), "42");
    }

    #[test]
    fn generated_ids_are_object_id_shaped_and_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_eq!(a.as_str().len(), 24);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn where_criteria_requires_every_key_to_match() {
        let alice = record("1", json!({ "name": "alice", "active": true }));
        let criteria = Criteria::from_json(json!({ "name": "alice", "active": true })).unwrap();
        assert!(criteria.matches(&alice));

        let criteria = Criteria::from_json(json!({ "name": "alice", "active": false })).unwrap();
        assert!(!criteria.matches(&alice));

        let criteria = Criteria::from_json(json!({ "missing": null })).unwrap();
        assert!(!criteria.matches(&alice));
    }

    #[test]
    fn empty_object_selects_everything() {
        assert_eq!(Criteria::from_json(json!({})), Some(Criteria::All));
    }

    #[test]
    fn non_object_filters_are_rejected() {
        assert_eq!(Criteria::from_json(json!(null)), None);
        assert_eq!(Criteria::from_json(json!("alice")), None);
        assert_eq!(Criteria::from_json(json!([{ "name": "alice" }])), None);
    }

    #[test]
    fn deserialized_ids_go_through_parse() {
        assert!(serde_json::from_str::<RecordId>("\"\"").is_err());
        assert!(serde_json::from_str::<RecordId>("\"  \"").is_err());
        let id: RecordId = serde_json::from_str("\" 42 \"").unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");

        let blank_record = json!({
            "id": "",
            "model": "User",
            "attributes": {},
            "created_at": 0,
            "updated_at": 0,
        });
        assert!(serde_json::from_value::<Record>(blank_record).is_err());
    }

    #[test]
    fn paginate_applies_offset_before_limit() {
        let options = QueryOptions {
            limit: Some(2),
            offset: 1,
        };
        assert_eq!(options.paginate(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(QueryOptions::default().paginate(vec![1, 2]), vec![1, 2]);
    }
}
