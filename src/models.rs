//! Wire and domain types for items, loans and recognised candidates.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier of a zone, furniture or drawer.
pub type LocationId = i64;

/// Reads an id that may arrive as a JSON number, a numeric string, an empty
/// string or `null`. Anything that is not a usable id becomes `None`.
pub fn parse_id(value: &Value) -> Option<LocationId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<LocationId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_id))
}

/// One candidate produced by voice recognition, editable by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedItem {
    pub name: String,
    pub included: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furniture_id: Option<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawer_id: Option<LocationId>,
    /// Catalogued item id when the server matched an existing item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LocationId>,
    #[serde(default)]
    pub is_conventional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_info: Option<String>,
}

impl RecognizedItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included: true,
            zone_id: None,
            furniture_id: None,
            drawer_id: None,
            id: None,
            is_conventional: false,
            location_info: None,
        }
    }

    /// Normalises one server entry. `included` is always set explicitly,
    /// honouring a boolean the server may have sent.
    pub fn from_server(entry: &Value) -> Self {
        let text = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|s| !s.trim().is_empty())
        };
        let id = |key: &str| entry.get(key).and_then(parse_id);

        Self {
            name: entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            included: entry
                .get("included")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            zone_id: id("zone_id"),
            furniture_id: id("furniture_id"),
            drawer_id: id("drawer_id"),
            id: id("id").or_else(|| id("db_id")),
            is_conventional: entry
                .get("is_conventional")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            location_info: text("location_info"),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn has_location(&self) -> bool {
        self.zone_id.is_some() && self.furniture_id.is_some() && self.drawer_id.is_some()
    }
}

/// Item as returned by `/api/items` and `/api/items/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<LocationId>,
    pub name: String,
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub zone_id: Option<LocationId>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub furniture_id: Option<LocationId>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub drawer_id: Option<LocationId>,
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub furniture_name: Option<String>,
    #[serde(default)]
    pub drawer_name: Option<String>,
    #[serde(default)]
    pub location_info: Option<String>,
}

/// Active loan as listed by `/api/loans?active_only=true`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub item_name: String,
    #[serde(default)]
    pub borrow_date: Option<String>,
    #[serde(default)]
    pub expected_return_date: Option<String>,
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default)]
    pub item_zone: Option<String>,
    #[serde(default)]
    pub item_mobilier: Option<String>,
    #[serde(default)]
    pub item_niveau_tiroir: Option<String>,
}

/// Body of `POST /api/items/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub furniture_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawer_id: Option<LocationId>,
    pub is_temporary: bool,
}

impl NewItem {
    pub fn temporary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone_id: None,
            furniture_id: None,
            drawer_id: None,
            is_temporary: true,
        }
    }
}

/// Result of `POST /api/items/add`; a name conflict hands back the existing item.
#[derive(Debug, Clone, PartialEq)]
pub enum AddItemOutcome {
    Created(InventoryItem),
    Existing {
        message: String,
        item: InventoryItem,
    },
}

/// Item entry of `POST /api/items/batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub name: String,
    pub zone_id: LocationId,
    pub furniture_id: LocationId,
    pub drawer_id: LocationId,
}

impl BatchItem {
    /// Only complete items convert; callers partition first.
    pub fn from_complete(item: &RecognizedItem) -> Option<Self> {
        Some(Self {
            name: item.name.trim().to_string(),
            zone_id: item.zone_id?,
            furniture_id: item.furniture_id?,
            drawer_id: item.drawer_id?,
        })
    }
}

/// Upper-cases the first character and trims, the way names are stored.
pub fn capitalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
