use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of a ledger item.
///
/// New items get a UUID v4 string. Older snapshots stored the creation
/// timestamp as a bare number, so deserialization accepts both shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub value: Decimal,
    #[serde(default)]
    pub category: String,
    /// Milliseconds since the Unix epoch. Informational only.
    #[serde(default)]
    pub created_at: i64,
}

impl Item {
    pub fn new(id: ItemId, value: Decimal, category: String, created_at: i64) -> Self {
        Self {
            id,
            value,
            category,
            created_at,
        }
    }

    /// Creation time rendered in local time, or an empty string for legacy
    /// items saved without one.
    pub fn created_label(&self) -> String {
        if self.created_at == 0 {
            return String::new();
        }
        chrono::DateTime::from_timestamp_millis(self.created_at)
            .map(|dt| {
                dt.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_default()
    }
}
