//! Client for the item, loan and location endpoints.

use crate::catalog::{Drawer, Furniture, LocationCatalog, Zone};
use crate::error::ApiError;
use crate::models::{AddItemOutcome, BatchItem, InventoryItem, LocationId, Loan, NewItem};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Entry of a loan request built from the borrow cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanRequestItem {
    pub id: LocationId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanRequest {
    pub items: Vec<LoanRequestItem>,
    /// `DD/MM/YYYY`
    pub return_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoanOutcome {
    pub status: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl LoanOutcome {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoanBatchResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub loans: Vec<LoanOutcome>,
}

#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn list_items(&self, temporary_only: bool) -> Result<Vec<InventoryItem>, ApiError>;

    async fn get_item(&self, id: LocationId) -> Result<InventoryItem, ApiError>;

    async fn add_item(&self, item: &NewItem) -> Result<AddItemOutcome, ApiError>;

    /// Returns the number of items the server created.
    async fn batch_create(&self, items: &[BatchItem]) -> Result<usize, ApiError>;

    async fn active_loans(&self) -> Result<Vec<Loan>, ApiError>;

    async fn create_loans(&self, request: &LoanRequest) -> Result<LoanBatchResult, ApiError>;

    async fn return_loan(&self, loan_id: i64) -> Result<(), ApiError>;

    async fn zones(&self) -> Result<Vec<Zone>, ApiError>;

    /// `None` lists the furniture of every zone.
    async fn furniture(&self, zone_id: Option<LocationId>) -> Result<Vec<Furniture>, ApiError>;

    /// `None` lists the drawers of every piece of furniture.
    async fn drawers(&self, furniture_id: Option<LocationId>) -> Result<Vec<Drawer>, ApiError>;
}

/// Fetch all three location collections at once. A collection that fails to
/// load is left empty so the catalog reports itself incomplete.
pub async fn load_catalog(api: &dyn InventoryApi) -> LocationCatalog {
    let (zones, furniture, drawers) = tokio::join!(api.zones(), api.furniture(None), api.drawers(None));

    let mut catalog = LocationCatalog::default();
    match zones {
        Ok(zones) => catalog.zones = zones,
        Err(e) => error!("Failed to load zones: {}", e),
    }
    match furniture {
        Ok(furniture) => catalog.furniture = furniture,
        Err(e) => error!("Failed to load furniture: {}", e),
    }
    match drawers {
        Ok(drawers) => catalog.drawers = drawers,
        Err(e) => error!("Failed to load drawers: {}", e),
    }

    if catalog.is_complete() {
        debug!(
            "Loaded {} zones, {} furniture, {} drawers",
            catalog.zones.len(),
            catalog.furniture.len(),
            catalog.drawers.len()
        );
    } else {
        warn!("Location catalog is incomplete");
    }
    catalog
}

pub struct HttpInventoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read(response: reqwest::Response) -> Result<(StatusCode, Value), ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let json = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };
        Ok((status, json))
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let (status, json) = Self::read(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &json));
        }
        Ok(json)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(StatusCode, Value), ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::read(response).await
    }
}

/// Error message from an `{error}` or `{message}` body, else the status line.
fn status_error(status: StatusCode, json: &Value) -> ApiError {
    let message = json
        .get("error")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "HTTP error {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string()
        });
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Accepts `{key: [...]}` or a bare array.
fn decode_list<T: DeserializeOwned>(json: Value, key: &str) -> Result<Vec<T>, ApiError> {
    match json {
        Value::Array(_) => decode(json),
        Value::Object(mut obj) => match obj.remove(key) {
            Some(list) => decode(list),
            None => Err(ApiError::Decode(format!("missing {} list", key))),
        },
        other => Err(ApiError::Decode(format!("expected a list, got {}", other))),
    }
}

fn decode_item(json: Value) -> Result<InventoryItem, ApiError> {
    match json {
        Value::Object(mut obj) if obj.contains_key("item") => decode(obj.remove("item").unwrap_or_default()),
        other => decode(other),
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn list_items(&self, temporary_only: bool) -> Result<Vec<InventoryItem>, ApiError> {
        let path = if temporary_only {
            "/api/items?is_temporary=true"
        } else {
            "/api/items"
        };
        decode_list(self.get_json(path).await?, "items")
    }

    async fn get_item(&self, id: LocationId) -> Result<InventoryItem, ApiError> {
        decode_item(self.get_json(&format!("/api/items/{}", id)).await?)
    }

    async fn add_item(&self, item: &NewItem) -> Result<AddItemOutcome, ApiError> {
        let body = serde_json::to_value(item).map_err(|e| ApiError::Decode(e.to_string()))?;
        let (status, json) = self.post_json("/api/items/add", &body).await?;
        interpret_add_item(status, json)
    }

    async fn batch_create(&self, items: &[BatchItem]) -> Result<usize, ApiError> {
        let (status, json) = self
            .post_json("/api/items/batch", &json!({ "items": items }))
            .await?;
        if !status.is_success() {
            return Err(status_error(status, &json));
        }
        json.get("added_count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| ApiError::Decode("missing added_count".to_string()))
    }

    async fn active_loans(&self) -> Result<Vec<Loan>, ApiError> {
        decode_list(self.get_json("/api/loans?active_only=true").await?, "loans")
    }

    async fn create_loans(&self, request: &LoanRequest) -> Result<LoanBatchResult, ApiError> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::Decode(e.to_string()))?;
        let (status, json) = self.post_json("/api/loans/create", &body).await?;
        if !status.is_success() {
            return Err(status_error(status, &json));
        }
        decode(json)
    }

    async fn return_loan(&self, loan_id: i64) -> Result<(), ApiError> {
        let (status, json) = self
            .post_json(&format!("/api/loans/{}/return", loan_id), &json!({}))
            .await?;
        if !status.is_success() || json.get("error").is_some() {
            return Err(status_error(status, &json));
        }
        Ok(())
    }

    async fn zones(&self) -> Result<Vec<Zone>, ApiError> {
        decode_list(self.get_json("/api/location/zones").await?, "zones")
    }

    async fn furniture(&self, zone_id: Option<LocationId>) -> Result<Vec<Furniture>, ApiError> {
        let path = match zone_id {
            Some(zone_id) => format!("/api/location/furniture?zone_id={}", zone_id),
            None => "/api/location/furniture?all=true".to_string(),
        };
        decode_list(self.get_json(&path).await?, "furniture")
    }

    async fn drawers(&self, furniture_id: Option<LocationId>) -> Result<Vec<Drawer>, ApiError> {
        let path = match furniture_id {
            Some(furniture_id) => format!("/api/location/drawers?furniture_id={}", furniture_id),
            None => "/api/location/drawers?all=true".to_string(),
        };
        decode_list(self.get_json(&path).await?, "drawers")
    }
}

/// A 409 carrying the existing item is a usable result, not a failure.
fn interpret_add_item(status: StatusCode, json: Value) -> Result<AddItemOutcome, ApiError> {
    if status == StatusCode::CONFLICT {
        if let Some(item) = json.get("item").cloned() {
            let message = json
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Item already exists")
                .to_string();
            warn!("Item already exists: {}", message);
            return Ok(AddItemOutcome::Existing {
                message,
                item: decode(item)?,
            });
        }
    }
    if !status.is_success() {
        return Err(status_error(status, &json));
    }
    Ok(AddItemOutcome::Created(decode_item(json)?))
}
