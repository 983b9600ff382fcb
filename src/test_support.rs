//! Fakes for the audio, recognition and inventory seams.

use crate::api::{InventoryApi, LoanBatchResult, LoanOutcome, LoanRequest};
use crate::audio_toolkit::{AudioBackend, AudioChunk, AudioInput};
use crate::catalog::{Drawer, Furniture, Zone};
use crate::error::{ApiError, CaptureError, RecognitionError};
use crate::models::{AddItemOutcome, BatchItem, InventoryItem, LocationId, Loan, NewItem, RecognizedItem};
use crate::recognition::{RecognitionRequest, Recognizer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/* ---------- audio -------------------------------------------------------- */

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    finishes: AtomicUsize,
    releases: AtomicUsize,
}

pub struct FakeBackend {
    supported: Vec<String>,
    reported_mime: Option<String>,
    chunks: Vec<AudioChunk>,
    level: u8,
    open_error: Option<CaptureError>,
    counters: Arc<Counters>,
}

impl FakeBackend {
    pub fn webm() -> Self {
        Self {
            supported: vec!["audio/webm".to_string()],
            reported_mime: Some("audio/webm".to_string()),
            chunks: vec![
                AudioChunk::new(vec![1, 2], "audio/webm"),
                AudioChunk::new(vec![3, 4], "audio/webm"),
            ],
            level: 0,
            open_error: None,
            counters: Arc::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            open_error: Some(CaptureError::PermissionDenied("NotAllowedError".into())),
            ..Self::webm()
        }
    }

    pub fn unsupported() -> Self {
        Self {
            open_error: Some(CaptureError::Unsupported("no input device".into())),
            ..Self::webm()
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> usize {
        self.counters.finishes.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }
}

impl AudioBackend for FakeBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn open(&self, _requested_mime: Option<&str>) -> Result<Box<dyn AudioInput>, CaptureError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(Box::new(FakeInput {
            mime: self.reported_mime.clone(),
            chunks: self.chunks.clone(),
            level: self.level,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeInput {
    mime: Option<String>,
    chunks: Vec<AudioChunk>,
    level: u8,
    counters: Arc<Counters>,
}

impl AudioInput for FakeInput {
    fn mime_type(&self) -> Option<String> {
        self.mime.clone()
    }

    fn frequency_data(&mut self, out: &mut [u8]) {
        out.fill(self.level);
    }

    fn finish(&mut self) -> Vec<AudioChunk> {
        self.counters.finishes.fetch_add(1, Ordering::SeqCst);
        std::mem::take(&mut self.chunks)
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/* ---------- recognition -------------------------------------------------- */

#[derive(Default)]
pub struct FakeRecognizer {
    responses: Mutex<VecDeque<Result<Vec<RecognizedItem>, RecognitionError>>>,
    requests: Mutex<Vec<(String, RecognitionRequest)>>,
}

impl FakeRecognizer {
    pub fn returning(result: Result<Vec<RecognizedItem>, RecognitionError>) -> Self {
        let recognizer = Self::default();
        recognizer.push(result);
        recognizer
    }

    pub fn push(&self, result: Result<Vec<RecognizedItem>, RecognitionError>) {
        self.responses.lock().unwrap().push_back(result);
    }

    pub fn requests(&self) -> Vec<(String, RecognitionRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(
        &self,
        endpoint: &str,
        request: RecognitionRequest,
    ) -> Result<Vec<RecognizedItem>, RecognitionError> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), request));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}

/* ---------- inventory api ------------------------------------------------ */

pub fn inventory_item(id: LocationId, name: &str, temporary: bool) -> InventoryItem {
    InventoryItem {
        id: Some(id),
        name: name.to_string(),
        is_temporary: temporary,
        zone_id: None,
        furniture_id: None,
        drawer_id: None,
        zone_name: None,
        furniture_name: None,
        drawer_name: None,
        location_info: None,
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub zones: Mutex<Vec<Zone>>,
    pub furniture: Mutex<Vec<Furniture>>,
    pub drawers: Mutex<Vec<Drawer>>,
    pub batch_result: Mutex<Option<Result<usize, ApiError>>>,
    pub batch_calls: Mutex<Vec<Vec<BatchItem>>>,
    pub added: Mutex<Vec<NewItem>>,
    pub add_conflicts: Mutex<Vec<String>>,
    pub add_failures: Mutex<Vec<String>>,
    pub known_items: Mutex<Vec<InventoryItem>>,
    pub loans: Mutex<Vec<Loan>>,
    pub returned: Mutex<Vec<i64>>,
    pub loan_requests: Mutex<Vec<LoanRequest>>,
    pub location_calls: AtomicUsize,
}

impl FakeApi {
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl InventoryApi for FakeApi {
    async fn list_items(&self, temporary_only: bool) -> Result<Vec<InventoryItem>, ApiError> {
        Ok(self
            .known_items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| !temporary_only || i.is_temporary)
            .cloned()
            .collect())
    }

    async fn get_item(&self, id: LocationId) -> Result<InventoryItem, ApiError> {
        self.known_items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == Some(id))
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                message: "Article non trouvé".into(),
            })
    }

    async fn add_item(&self, item: &NewItem) -> Result<AddItemOutcome, ApiError> {
        self.added.lock().unwrap().push(item.clone());
        if self.add_failures.lock().unwrap().contains(&item.name) {
            return Err(ApiError::Status {
                status: 500,
                message: format!("cannot add {}", item.name),
            });
        }
        if self.add_conflicts.lock().unwrap().contains(&item.name) {
            return Ok(AddItemOutcome::Existing {
                message: "already exists".into(),
                item: inventory_item(77, &item.name, true),
            });
        }
        let id = 100 + self.added.lock().unwrap().len() as i64;
        Ok(AddItemOutcome::Created(inventory_item(id, &item.name, true)))
    }

    async fn batch_create(&self, items: &[BatchItem]) -> Result<usize, ApiError> {
        self.batch_calls.lock().unwrap().push(items.to_vec());
        self.batch_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(items.len()))
    }

    async fn active_loans(&self) -> Result<Vec<Loan>, ApiError> {
        Ok(self.loans.lock().unwrap().clone())
    }

    async fn create_loans(&self, request: &LoanRequest) -> Result<LoanBatchResult, ApiError> {
        self.loan_requests.lock().unwrap().push(request.clone());
        Ok(LoanBatchResult {
            success: true,
            loans: request
                .items
                .iter()
                .map(|i| LoanOutcome {
                    status: "success".into(),
                    item_name: i.name.clone(),
                    error: None,
                })
                .collect(),
        })
    }

    async fn return_loan(&self, loan_id: i64) -> Result<(), ApiError> {
        let mut loans = self.loans.lock().unwrap();
        match loans.iter().position(|l| l.id == loan_id) {
            Some(pos) => {
                loans.remove(pos);
                self.returned.lock().unwrap().push(loan_id);
                Ok(())
            }
            None => Err(ApiError::Status {
                status: 404,
                message: "Emprunt non trouvé".into(),
            }),
        }
    }

    async fn zones(&self) -> Result<Vec<Zone>, ApiError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn furniture(&self, zone_id: Option<LocationId>) -> Result<Vec<Furniture>, ApiError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .furniture
            .lock()
            .unwrap()
            .iter()
            .filter(|f| zone_id.is_none() || f.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn drawers(&self, furniture_id: Option<LocationId>) -> Result<Vec<Drawer>, ApiError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .drawers
            .lock()
            .unwrap()
            .iter()
            .filter(|d| furniture_id.is_none() || d.furniture_id == furniture_id)
            .cloned()
            .collect())
    }
}
