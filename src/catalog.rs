use crate::models::{parse_id, LocationId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

fn deserialize_id<'de, D>(deserializer: D) -> Result<LocationId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_id(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid id: {}", value)))
}

fn deserialize_parent_id<'de, D>(deserializer: D) -> Result<Option<LocationId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: LocationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Furniture {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: LocationId,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_parent_id")]
    pub zone_id: Option<LocationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawer {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: LocationId,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_parent_id")]
    pub furniture_id: Option<LocationId>,
}

/// One entry of a select list. The placeholder has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: Option<LocationId>,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    fn placeholder(label: &str, selected: bool) -> Self {
        Self {
            value: None,
            label: label.to_string(),
            selected,
        }
    }
}

/// Zones, furniture and drawers known to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationCatalog {
    pub zones: Vec<Zone>,
    pub furniture: Vec<Furniture>,
    pub drawers: Vec<Drawer>,
}

impl LocationCatalog {
    /// A catalog with any empty collection is worth reloading.
    pub fn is_complete(&self) -> bool {
        !self.zones.is_empty() && !self.furniture.is_empty() && !self.drawers.is_empty()
    }

    pub fn zone_name(&self, id: LocationId) -> Option<&str> {
        self.zones.iter().find(|z| z.id == id).map(|z| z.name.as_str())
    }

    pub fn furniture_name(&self, id: LocationId) -> Option<&str> {
        self.furniture
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.name.as_str())
    }

    pub fn drawer_name(&self, id: LocationId) -> Option<&str> {
        self.drawers
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.as_str())
    }

    pub fn furniture_belongs_to(&self, furniture_id: LocationId, zone_id: LocationId) -> bool {
        self.furniture
            .iter()
            .any(|f| f.id == furniture_id && f.zone_id == Some(zone_id))
    }

    pub fn drawer_belongs_to(&self, drawer_id: LocationId, furniture_id: LocationId) -> bool {
        self.drawers
            .iter()
            .any(|d| d.id == drawer_id && d.furniture_id == Some(furniture_id))
    }

    pub fn zone_options(&self, selected: Option<LocationId>) -> Vec<SelectOption> {
        let mut options = vec![SelectOption::placeholder("Select a zone", selected.is_none())];
        options.extend(self.zones.iter().map(|z| SelectOption {
            value: Some(z.id),
            label: z.name.clone(),
            selected: selected == Some(z.id),
        }));
        options
    }

    /// Furniture of `zone_id`; only the placeholder when no zone is chosen.
    pub fn furniture_options(
        &self,
        zone_id: Option<LocationId>,
        selected: Option<LocationId>,
    ) -> Vec<SelectOption> {
        let mut options = vec![SelectOption::placeholder(
            "Select a piece of furniture",
            selected.is_none(),
        )];
        if let Some(zone_id) = zone_id {
            options.extend(
                self.furniture
                    .iter()
                    .filter(|f| f.zone_id == Some(zone_id))
                    .map(|f| SelectOption {
                        value: Some(f.id),
                        label: f.name.clone(),
                        selected: selected == Some(f.id),
                    }),
            );
        }
        options
    }

    pub fn drawer_options(
        &self,
        furniture_id: Option<LocationId>,
        selected: Option<LocationId>,
    ) -> Vec<SelectOption> {
        let mut options = vec![SelectOption::placeholder(
            "Select a drawer",
            selected.is_none(),
        )];
        if let Some(furniture_id) = furniture_id {
            options.extend(
                self.drawers
                    .iter()
                    .filter(|d| d.furniture_id == Some(furniture_id))
                    .map(|d| SelectOption {
                        value: Some(d.id),
                        label: d.name.clone(),
                        selected: selected == Some(d.id),
                    }),
            );
        }
        options
    }

    /// Context attached to inventory recognition requests.
    pub fn context_json(&self) -> Value {
        json!({
            "zones": self
                .zones
                .iter()
                .map(|z| json!({"id": z.id, "name": z.name}))
                .collect::<Vec<_>>(),
            "furniture": self
                .furniture
                .iter()
                .map(|f| json!({"id": f.id, "name": f.name, "zone_id": f.zone_id}))
                .collect::<Vec<_>>(),
            "drawers": self
                .drawers
                .iter()
                .map(|d| json!({"id": d.id, "name": d.name, "furniture_id": d.furniture_id}))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_catalog() -> LocationCatalog {
    LocationCatalog {
        zones: vec![
            Zone { id: 1, name: "Atelier".into() },
            Zone { id: 2, name: "Garage".into() },
        ],
        furniture: vec![
            Furniture { id: 2, name: "Armoire".into(), zone_id: Some(1) },
            Furniture { id: 3, name: "Etabli".into(), zone_id: Some(1) },
            Furniture { id: 4, name: "Etagere".into(), zone_id: Some(2) },
        ],
        drawers: vec![
            Drawer { id: 3, name: "Tiroir 1".into(), furniture_id: Some(2) },
            Drawer { id: 5, name: "Tiroir 2".into(), furniture_id: Some(4) },
        ],
    }
}
