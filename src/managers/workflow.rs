use crate::api::{load_catalog, InventoryApi};
use crate::cart::BorrowCart;
use crate::catalog::LocationCatalog;
use crate::error::{ApiError, CaptureError, ItemWarning, RecognitionError, ReconcileError, SubmitError};
use crate::managers::capture::{AudioCaptureSession, StopOutcome};
use crate::models::{capitalize_name, AddItemOutcome, BatchItem, InventoryItem, LocationId, NewItem, RecognizedItem};
use crate::notifications::{Notifier, Toast, ToastLevel};
use crate::recognition::{RecognitionRequest, Recognizer, INVENTORY_VOICE_PATH, VOICE_RECOGNITION_PATH};
use crate::reconciler::{ReconcileMode, ResultReconciler};
use crate::view::{render, RenderView, ViewInput};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tokio::sync::mpsc;

/// Differences between the temporary-item flow and the inventory flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub attach_location_context: bool,
    pub temporary_only: Option<bool>,
    pub mode: ReconcileMode,
}

impl FlowConfig {
    pub fn voice(temporary_only: bool) -> Self {
        Self {
            name: "voice",
            endpoint: VOICE_RECOGNITION_PATH,
            attach_location_context: false,
            temporary_only: Some(temporary_only),
            mode: ReconcileMode::Flat,
        }
    }

    pub fn inventory() -> Self {
        Self {
            name: "inventory",
            endpoint: INVENTORY_VOICE_PATH,
            attach_location_context: true,
            temporary_only: None,
            mode: ReconcileMode::Location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Ready,
    Recording,
    Processing,
    Results,
    Error(RecognitionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEdit {
    Name(usize, String),
    Zone(usize, Option<LocationId>),
    Furniture(usize, Option<LocationId>),
    Drawer(usize, Option<LocationId>),
    Included(usize, bool),
    Remove(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    Toggle,
    Start,
    Stop,
    Cancel,
    Reset,
    Submit,
    Edit(ItemEdit),
    Quit,
}

pub type RenderObserver = Box<dyn Fn(&RenderView) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read(catalog: &RwLock<LocationCatalog>) -> RwLockReadGuard<'_, LocationCatalog> {
    catalog.read().unwrap_or_else(|e| e.into_inner())
}

/// Drives capture, recognition, editing and submission for one flow.
pub struct VoiceWorkflow {
    config: FlowConfig,
    state: WorkflowState,
    capture: AudioCaptureSession,
    recognizer: Arc<dyn Recognizer>,
    api: Arc<dyn InventoryApi>,
    notifier: Arc<dyn Notifier>,
    catalog: Arc<RwLock<LocationCatalog>>,
    cart: Arc<Mutex<BorrowCart>>,
    reconciler: ResultReconciler,
    voice_available: bool,
    observer: Option<RenderObserver>,
}

impl VoiceWorkflow {
    /* ---------- construction ------------------------------------------------ */

    pub fn new(
        config: FlowConfig,
        capture: AudioCaptureSession,
        recognizer: Arc<dyn Recognizer>,
        api: Arc<dyn InventoryApi>,
        notifier: Arc<dyn Notifier>,
        cart: Arc<Mutex<BorrowCart>>,
    ) -> Self {
        let reconciler = ResultReconciler::new(config.mode);
        Self {
            config,
            state: WorkflowState::Ready,
            capture,
            recognizer,
            api,
            notifier,
            catalog: Arc::new(RwLock::new(LocationCatalog::default())),
            cart,
            reconciler,
            voice_available: true,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: RenderObserver) {
        self.observer = Some(observer);
    }

    /* ---------- accessors --------------------------------------------------- */

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn items(&self) -> &[RecognizedItem] {
        self.reconciler.items()
    }

    pub fn voice_available(&self) -> bool {
        self.voice_available
    }

    pub fn capture(&self) -> &AudioCaptureSession {
        &self.capture
    }

    pub fn catalog(&self) -> LocationCatalog {
        read(&self.catalog).clone()
    }

    pub fn render(&self) -> RenderView {
        let catalog = read(&self.catalog);
        let levels = self.capture.levels();
        render(&ViewInput {
            state: &self.state,
            voice_available: self.voice_available,
            elapsed_secs: self.capture.elapsed_secs(),
            levels: &levels,
            reconciler: &self.reconciler,
            catalog: &catalog,
        })
    }

    fn emit(&self) {
        if let Some(observer) = &self.observer {
            observer(&self.render());
        }
    }

    fn transition(&mut self, state: WorkflowState) {
        debug!("[{}] {:?} -> {:?}", self.config.name, self.state, state);
        self.state = state;
        self.emit();
    }

    fn toast(&self, toast: Toast) {
        self.notifier.notify(toast);
    }

    /* ---------- locations --------------------------------------------------- */

    /// Replace the catalog with a fresh copy from the server.
    pub async fn load_locations(&self) {
        let fresh = load_catalog(self.api.as_ref()).await;
        *self.catalog.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    }

    /* ---------- recording --------------------------------------------------- */

    pub async fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.state != WorkflowState::Ready {
            debug!("Start ignored in {:?}", self.state);
            return Ok(());
        }
        if !self.voice_available {
            return Err(CaptureError::Unsupported(
                "voice recognition was disabled for this session".to_string(),
            ));
        }

        self.reconciler.clear();
        match self.capture.start().await {
            Ok(()) => {
                self.transition(WorkflowState::Recording);
                Ok(())
            }
            Err(e) => {
                error!("Could not start recording: {}", e);
                if e.is_terminal() {
                    self.voice_available = false;
                    self.toast(Toast::danger(
                        "Voice recognition unavailable",
                        "Voice recognition is not supported on this system.",
                    ));
                } else {
                    self.toast(Toast::danger(
                        "Microphone error",
                        format!("Unable to access the microphone: {}", e),
                    ));
                }
                self.emit();
                Err(e)
            }
        }
    }

    /// Stop capturing and run recognition on what was recorded.
    pub async fn stop_recording(&mut self) {
        if self.state != WorkflowState::Recording {
            debug!("Stop ignored in {:?}", self.state);
            return;
        }

        let audio = match self.capture.stop(false).await {
            StopOutcome::Captured(audio) => audio,
            other => {
                warn!("Capture ended without audio: {:?}", other);
                self.transition(WorkflowState::Ready);
                return;
            }
        };
        self.transition(WorkflowState::Processing);

        let (context, catalog_complete) = {
            let catalog = read(&self.catalog);
            let context = self
                .config
                .attach_location_context
                .then(|| catalog.context_json());
            (context, catalog.is_complete())
        };

        let request = RecognitionRequest {
            audio,
            context,
            temporary_only: self.config.temporary_only,
        };

        let recognizer = self.recognizer.clone();
        let recognize = recognizer.recognize(self.config.endpoint, request);
        let result = if self.config.attach_location_context && !catalog_complete {
            info!("Location catalog incomplete, reloading alongside recognition");
            let (result, ()) = tokio::join!(recognize, self.load_locations());
            result
        } else {
            recognize.await
        };

        match result {
            Ok(items) => {
                info!("Recognition returned {} item(s)", items.len());
                self.reconciler.load(items);
                self.transition(WorkflowState::Results);
            }
            Err(e) => {
                error!("Recognition failed: {}", e);
                self.toast(Toast::danger(e.title(), e.user_message()));
                self.transition(WorkflowState::Error(e));
            }
        }
    }

    pub async fn toggle(&mut self) {
        match self.state {
            WorkflowState::Ready => {
                let _ = self.start_recording().await;
            }
            WorkflowState::Recording => self.stop_recording().await,
            _ => debug!("Toggle ignored in {:?}", self.state),
        }
    }

    /// Discard the current recording. Only meaningful while recording.
    pub async fn cancel(&mut self) {
        if self.state != WorkflowState::Recording {
            debug!("Cancel ignored in {:?}", self.state);
            return;
        }
        self.capture.stop(true).await;
        self.reconciler.clear();
        self.transition(WorkflowState::Ready);
    }

    /// Leave results or an error and get ready for a new recording.
    pub fn reset(&mut self) {
        match self.state {
            WorkflowState::Results | WorkflowState::Error(_) => {
                self.reconciler.clear();
                self.transition(WorkflowState::Ready);
            }
            _ => debug!("Reset ignored in {:?}", self.state),
        }
    }

    /// Called when the capture session hit its maximum duration.
    pub async fn handle_auto_stop(&mut self) {
        if self.state == WorkflowState::Recording {
            info!("Stopping recording automatically");
            self.stop_recording().await;
        }
    }

    /* ---------- editing ----------------------------------------------------- */

    pub fn edit(&mut self, edit: ItemEdit) -> Result<(), ReconcileError> {
        match edit {
            ItemEdit::Name(index, name) => self.reconciler.set_name(index, name)?,
            ItemEdit::Included(index, included) => self.reconciler.set_included(index, included)?,
            ItemEdit::Zone(index, zone_id) => {
                self.check_zone(zone_id)?;
                self.reconciler.set_zone(index, zone_id)?;
            }
            ItemEdit::Furniture(index, furniture_id) => {
                let zone_id = self.item_field(index, |i| i.zone_id)?;
                self.check_furniture(zone_id, furniture_id)?;
                self.reconciler.set_furniture(index, furniture_id)?;
            }
            ItemEdit::Drawer(index, drawer_id) => {
                let furniture_id = self.item_field(index, |i| i.furniture_id)?;
                self.check_drawer(furniture_id, drawer_id)?;
                self.reconciler.set_drawer(index, drawer_id)?;
            }
            ItemEdit::Remove(index) => {
                self.reconciler.remove(index)?;
            }
        }
        self.emit();
        Ok(())
    }

    fn item_field(
        &self,
        index: usize,
        field: impl Fn(&RecognizedItem) -> Option<LocationId>,
    ) -> Result<Option<LocationId>, ReconcileError> {
        self.reconciler
            .items()
            .get(index)
            .map(field)
            .ok_or(ReconcileError::StaleIndex {
                index,
                len: self.reconciler.len(),
            })
    }

    fn check_zone(&self, zone_id: Option<LocationId>) -> Result<(), ReconcileError> {
        let catalog = read(&self.catalog);
        match zone_id {
            Some(id) if !catalog.zones.is_empty() && catalog.zone_name(id).is_none() => {
                Err(ReconcileError::OutOfScope { kind: "Zone", id })
            }
            _ => Ok(()),
        }
    }

    fn check_furniture(
        &self,
        zone_id: Option<LocationId>,
        furniture_id: Option<LocationId>,
    ) -> Result<(), ReconcileError> {
        let catalog = read(&self.catalog);
        match furniture_id {
            Some(id) if !catalog.furniture.is_empty() => {
                let in_scope = zone_id.is_some_and(|zone| catalog.furniture_belongs_to(id, zone));
                if in_scope {
                    Ok(())
                } else {
                    Err(ReconcileError::OutOfScope { kind: "Furniture", id })
                }
            }
            _ => Ok(()),
        }
    }

    fn check_drawer(
        &self,
        furniture_id: Option<LocationId>,
        drawer_id: Option<LocationId>,
    ) -> Result<(), ReconcileError> {
        let catalog = read(&self.catalog);
        match drawer_id {
            Some(id) if !catalog.drawers.is_empty() => {
                let in_scope =
                    furniture_id.is_some_and(|furniture| catalog.drawer_belongs_to(id, furniture));
                if in_scope {
                    Ok(())
                } else {
                    Err(ReconcileError::OutOfScope { kind: "Drawer", id })
                }
            }
            _ => Ok(()),
        }
    }

    /* ---------- submission -------------------------------------------------- */

    /// Send the accepted items. Returns how many were added.
    pub async fn submit(&mut self) -> Result<usize, SubmitError> {
        if self.state != WorkflowState::Results {
            return Err(SubmitError::NotReady);
        }

        let accepted = self.reconciler.accepted_items();
        if accepted.complete.is_empty() && accepted.incomplete.is_empty() {
            self.toast(Toast::new(
                ToastLevel::Info,
                "Nothing selected",
                "No item is selected for addition.",
            ));
            return Err(SubmitError::NothingToSubmit);
        }

        for (index, item) in &accepted.incomplete {
            let name = if item.has_name() {
                item.name.clone()
            } else {
                "Unnamed".to_string()
            };
            let warning = ItemWarning::IncompleteItem {
                index: *index,
                name,
            };
            warn!("{}", warning);
            self.toast(Toast::warning("Incomplete item", warning.to_string()));
        }

        if accepted.complete.is_empty() {
            let err = SubmitError::NothingToSubmit;
            self.toast(Toast::danger("Nothing to add", err.to_string()));
            return Err(err);
        }

        let items: Vec<RecognizedItem> = accepted.complete.into_iter().map(|(_, i)| i).collect();
        let result = match self.config.mode {
            ReconcileMode::Location => self.submit_batch(&items).await,
            ReconcileMode::Flat => self.submit_to_cart(&items).await,
        };

        if let Ok(count) = result {
            info!("Submitted {} item(s)", count);
            self.reconciler.clear();
            self.transition(WorkflowState::Ready);
        }
        result
    }

    async fn submit_batch(&self, items: &[RecognizedItem]) -> Result<usize, SubmitError> {
        let batch: Vec<BatchItem> = items.iter().filter_map(BatchItem::from_complete).collect();
        match self.api.batch_create(&batch).await {
            Ok(count) => {
                self.toast(Toast::success(
                    "Items added",
                    format!("{} item(s) added successfully.", count),
                ));
                Ok(count)
            }
            Err(e) => {
                error!("Batch creation failed: {}", e);
                self.toast(Toast::danger("Error", e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Temporary flow: every item ends up in the borrow cart.
    async fn submit_to_cart(&self, items: &[RecognizedItem]) -> Result<usize, SubmitError> {
        let mut added = 0;
        let mut first_error = None;

        for item in items {
            let name = capitalize_name(&item.name);
            let resolved = match (item.is_conventional, item.id) {
                (true, Some(id)) => Ok(self.fetch_conventional(id, &name, item).await),
                _ => self.create_temporary(&name).await,
            };

            match resolved {
                Ok(inventory_item) => {
                    if self.queue_for_borrowing(&inventory_item, &name) {
                        added += 1;
                    }
                }
                Err(e) => {
                    self.toast(Toast::danger(
                        "Error",
                        format!("Unable to add the temporary item \"{}\": {}", name, e),
                    ));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if added == 0 => Err(e.into()),
            _ => {
                if added > 0 {
                    self.toast(Toast::success(
                        "Items added",
                        format!("{} item(s) added to the borrow list.", added),
                    ));
                }
                Ok(added)
            }
        }
    }

    async fn fetch_conventional(
        &self,
        id: LocationId,
        name: &str,
        recognized: &RecognizedItem,
    ) -> InventoryItem {
        match self.api.get_item(id).await {
            Ok(item) => item,
            Err(e) => {
                warn!("Could not fetch item {}: {}", id, e);
                self.toast(Toast::warning(
                    "Partial information",
                    format!("Partial information for item \"{}\"", name),
                ));
                InventoryItem {
                    id: Some(id),
                    name: name.to_string(),
                    is_temporary: false,
                    zone_id: recognized.zone_id,
                    furniture_id: recognized.furniture_id,
                    drawer_id: recognized.drawer_id,
                    zone_name: None,
                    furniture_name: None,
                    drawer_name: None,
                    location_info: recognized.location_info.clone(),
                }
            }
        }
    }

    /// A name conflict hands back the existing item, which is reused.
    async fn create_temporary(&self, name: &str) -> Result<InventoryItem, ApiError> {
        match self.api.add_item(&NewItem::temporary(name)).await? {
            AddItemOutcome::Created(item) => Ok(item),
            AddItemOutcome::Existing { message, item } => {
                info!("Reusing existing item for \"{}\": {}", name, message);
                self.toast(Toast::warning("Existing item", message));
                Ok(item)
            }
        }
    }

    fn queue_for_borrowing(&self, item: &InventoryItem, name: &str) -> bool {
        let added = lock(&self.cart).add(item, name);
        if !added {
            self.toast(Toast::warning(
                "Already in the list",
                format!("The item \"{}\" is already in your borrow list", name),
            ));
        }
        added
    }

    /* ---------- event loop -------------------------------------------------- */

    async fn handle(&mut self, command: WorkflowCommand) {
        match command {
            WorkflowCommand::Toggle => self.toggle().await,
            WorkflowCommand::Start => {
                let _ = self.start_recording().await;
            }
            WorkflowCommand::Stop => self.stop_recording().await,
            WorkflowCommand::Cancel => self.cancel().await,
            WorkflowCommand::Reset => self.reset(),
            WorkflowCommand::Submit => {
                if let Err(e) = self.submit().await {
                    debug!("Submit did not complete: {}", e);
                    self.emit();
                }
            }
            WorkflowCommand::Edit(edit) => {
                if let Err(e) = self.edit(edit) {
                    warn!("Edit rejected: {}", e);
                    self.toast(Toast::warning("Edit rejected", e.to_string()));
                }
            }
            WorkflowCommand::Quit => {}
        }
    }

    /// Process commands until `Quit` or until every sender is gone. The
    /// capture auto-stop is handled here as well.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<WorkflowCommand>) {
        if self.config.attach_location_context {
            self.load_locations().await;
        }
        self.emit();

        loop {
            let signal = self.capture.auto_stop_signal();
            let auto_stop = async move {
                match signal {
                    Some(notify) => notify.notified().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(WorkflowCommand::Quit) | None => break,
                    Some(command) => self.handle(command).await,
                },
                _ = auto_stop => self.handle_auto_stop().await,
            }
        }

        if self.capture.is_recording() {
            self.capture.stop(true).await;
        }
        info!("[{}] workflow stopped", self.config.name);
    }
}
