//! Index definitions
//!
//! An `IndexSpec` names an ordered list of key fields on one collection,
//! optionally restricted by a partial filter. Two specs are the same index
//! when collection, name and key pattern all agree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::PredicateFilter;
use crate::pipeline::ast::Predicate;

/// Name of the implicit primary index every collection carries
pub const PRIMARY_INDEX: &str = "_id_";

/// Direction of one key in an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDirection {
    Asc,
    Desc,
    /// Full-text key
    Text,
}

impl KeyDirection {
    fn pattern(&self) -> &'static str {
        match self {
            KeyDirection::Asc => "1",
            KeyDirection::Desc => "-1",
            KeyDirection::Text => "\"text\"",
        }
    }
}

/// One key field of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: KeyDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub collection: String,
    pub name: String,
    pub keys: Vec<IndexKey>,
    #[serde(default)]
    pub unique: bool,
    /// Only documents matching every predicate are indexed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_filter: Vec<Predicate>,
    /// Text-key weights
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
}

impl IndexSpec {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            keys: Vec::new(),
            unique: false,
            partial_filter: Vec::new(),
            weights: BTreeMap::new(),
            default_language: None,
        }
    }

    /// The implicit `_id_` index
    pub fn primary(collection: impl Into<String>) -> Self {
        Self::new(collection, PRIMARY_INDEX).asc("_id").unique()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.key(field, KeyDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.key(field, KeyDirection::Desc)
    }

    /// Adds a text key with the given weight
    pub fn text(mut self, field: impl Into<String>, weight: u32) -> Self {
        let field = field.into();
        self.weights.insert(field.clone(), weight);
        self.key(field, KeyDirection::Text)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn partial(mut self, predicate: Predicate) -> Self {
        self.partial_filter.push(predicate);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    fn key(mut self, field: impl Into<String>, direction: KeyDirection) -> Self {
        self.keys.push(IndexKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys
    }

    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|k| k.direction == KeyDirection::Text)
    }

    /// Leading key field, used for access-path selection
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|k| k.field.as_str())
    }

    /// Whether a document falls inside the partial filter
    pub fn covers(&self, document: &Value) -> bool {
        PredicateFilter::matches(document, &self.partial_filter)
    }

    /// Key pattern in the familiar `{ field: 1, other: -1 }` form
    pub fn key_pattern(&self) -> String {
        let keys = self
            .keys
            .iter()
            .map(|k| format!("{}: {}", k.field, k.direction.pattern()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{ {} }}", keys)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.collection.trim().is_empty() {
            return Err("index must name a collection".into());
        }
        if self.name.trim().is_empty() {
            return Err("index must have a name".into());
        }
        if self.keys.is_empty() {
            return Err(format!("index '{}' has no key fields", self.name));
        }
        if self.keys.iter().any(|k| k.field.trim().is_empty()) {
            return Err(format!("index '{}' has an empty key field", self.name));
        }
        if self.unique && self.is_text() {
            return Err(format!("text index '{}' cannot be unique", self.name));
        }
        Ok(())
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.key_pattern())?;
        if self.unique {
            write!(f, " unique")?;
        }
        if !self.partial_filter.is_empty() {
            let filter = self
                .partial_filter
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(" AND ");
            write!(f, " partial({})", filter)?;
        }
        if let Some(language) = &self.default_language {
            write!(f, " language={}", language)?;
        }
        Ok(())
    }
}
