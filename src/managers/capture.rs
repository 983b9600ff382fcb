use crate::audio_toolkit::audio::visualizer::MIN_BAR_HEIGHT;
use crate::audio_toolkit::audio::FALLBACK_MIME_TYPE;
use crate::audio_toolkit::{
    bar_heights, negotiate_mime_type, AudioBackend, AudioChunk, StreamGuard,
};
use crate::capture_state::CaptureStatus;
use crate::error::CaptureError;
use crate::recognition::CapturedAudio;
use crate::scheduler::RepeatingTask;
use log::{debug, info, warn};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const TIMER_PERIOD: Duration = Duration::from_secs(1);
const FRAME_PERIOD: Duration = Duration::from_millis(16);
const SPECTRUM_BINS: usize = 64;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub max_duration: Duration,
    pub visualizer_bars: usize,
    pub preferred_mime_types: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(30),
            visualizer_bars: 12,
            preferred_mime_types: vec![
                "audio/webm;codecs=opus".to_string(),
                "audio/webm".to_string(),
                "audio/mp4".to_string(),
                "audio/ogg;codecs=opus".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Audio ready for recognition.
    Captured(CapturedAudio),
    /// Cancelled; the audio was thrown away.
    Discarded,
    /// Nothing was recording.
    NotRecording,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Joins recorder chunks into one upload, tagged with the encoding the
/// recorder reported, else the first chunk's type, else webm.
pub fn finalize_chunks(chunks: Vec<AudioChunk>, negotiated: Option<&str>) -> CapturedAudio {
    let mime_type = negotiated
        .map(str::to_string)
        .or_else(|| chunks.first().and_then(|c| c.mime_type.clone()))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

    let data = chunks.into_iter().flat_map(|c| c.data).collect();
    CapturedAudio { data, mime_type }
}

/// One microphone session at a time: stream, recorder, elapsed timer and
/// the live visualiser.
pub struct AudioCaptureSession {
    backend: Arc<dyn AudioBackend>,
    config: CaptureConfig,
    status: Arc<CaptureStatus>,
    elapsed: Arc<AtomicU64>,
    levels: Arc<Mutex<Vec<u32>>>,
    stream: Option<Arc<Mutex<StreamGuard>>>,
    negotiated_mime: Option<String>,
    timer: Option<RepeatingTask>,
    visualiser: Option<RepeatingTask>,
    auto_stop: Option<Arc<Notify>>,
}

impl AudioCaptureSession {
    /* ---------- construction ------------------------------------------------ */

    pub fn new(backend: Arc<dyn AudioBackend>, config: CaptureConfig) -> Self {
        let idle_levels = vec![MIN_BAR_HEIGHT as u32; config.visualizer_bars];
        Self {
            backend,
            config,
            status: Arc::new(CaptureStatus::new()),
            elapsed: Arc::new(AtomicU64::new(0)),
            levels: Arc::new(Mutex::new(idle_levels)),
            stream: None,
            negotiated_mime: None,
            timer: None,
            visualiser: None,
            auto_stop: None,
        }
    }

    /* ---------- accessors --------------------------------------------------- */

    pub fn is_recording(&self) -> bool {
        self.status.is_recording()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }

    pub fn max_duration(&self) -> Duration {
        self.config.max_duration
    }

    pub fn levels(&self) -> Vec<u32> {
        lock(&self.levels).clone()
    }

    pub fn negotiated_mime_type(&self) -> Option<&str> {
        self.negotiated_mime.as_deref()
    }

    /// Fires once when the maximum duration is reached. A fresh signal is
    /// created for every session.
    pub fn auto_stop_signal(&self) -> Option<Arc<Notify>> {
        self.auto_stop.clone()
    }

    pub fn has_running_tasks(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
            || self.visualiser.as_ref().is_some_and(|t| !t.is_finished())
    }

    /* ---------- microphone life-cycle -------------------------------------- */

    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if !self.status.try_start() {
            return Err(CaptureError::AlreadyActive);
        }

        let requested = negotiate_mime_type(self.backend.as_ref(), &self.config.preferred_mime_types);
        debug!("Requested recording type: {:?}", requested);

        let backend = self.backend.clone();
        let opened = tokio::task::spawn_blocking(move || backend.open(requested.as_deref()))
            .await
            .unwrap_or_else(|e| Err(CaptureError::Unsupported(format!("microphone open failed: {}", e))));

        let input = match opened {
            Ok(input) => input,
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                self.status.reset();
                return Err(e);
            }
        };

        self.negotiated_mime = input.mime_type();
        info!(
            "Recording started ({})",
            self.negotiated_mime.as_deref().unwrap_or("unknown type")
        );

        let stream = Arc::new(Mutex::new(StreamGuard::new(input)));
        self.stream = Some(stream.clone());
        self.elapsed.store(0, Ordering::SeqCst);
        *lock(&self.levels) = vec![MIN_BAR_HEIGHT as u32; self.config.visualizer_bars];

        let notify = Arc::new(Notify::new());
        self.auto_stop = Some(notify.clone());

        self.timer = Some(self.spawn_timer(notify));
        self.visualiser = Some(self.spawn_visualiser(stream));
        Ok(())
    }

    fn spawn_timer(&self, notify: Arc<Notify>) -> RepeatingTask {
        let status = self.status.clone();
        let elapsed = self.elapsed.clone();
        let max_secs = self.config.max_duration.as_secs().max(1);

        RepeatingTask::spawn(
            "elapsed timer",
            TIMER_PERIOD,
            move || status.is_recording(),
            move || {
                let secs = elapsed.fetch_add(1, Ordering::SeqCst) + 1;
                if secs >= max_secs {
                    info!("Maximum recording time of {}s reached", max_secs);
                    notify.notify_one();
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
    }

    fn spawn_visualiser(&self, stream: Arc<Mutex<StreamGuard>>) -> RepeatingTask {
        let status = self.status.clone();
        let levels = self.levels.clone();
        let bars = self.config.visualizer_bars;
        let started = Instant::now();
        let mut bins = vec![0u8; SPECTRUM_BINS];

        RepeatingTask::spawn(
            "visualiser",
            FRAME_PERIOD,
            move || status.is_recording(),
            move || {
                if !lock(&stream).frequency_data(&mut bins) {
                    return ControlFlow::Break(());
                }
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                *lock(&levels) = bar_heights(&bins, bars, elapsed_ms);
                ControlFlow::Continue(())
            },
        )
    }

    /// Halt capture and release the microphone. With `cancel` the audio is
    /// discarded, otherwise it is finalised into one payload.
    pub async fn stop(&mut self, cancel: bool) -> StopOutcome {
        if !self.status.try_stop() {
            return StopOutcome::NotRecording;
        }

        if let Some(timer) = self.timer.take() {
            timer.shutdown().await;
        }
        if let Some(visualiser) = self.visualiser.take() {
            visualiser.shutdown().await;
        }
        self.auto_stop = None;

        let outcome = match self.stream.take() {
            Some(stream) => {
                let mut guard = lock(&stream);
                if cancel {
                    guard.release();
                    StopOutcome::Discarded
                } else {
                    let chunks = guard.finish();
                    StopOutcome::Captured(finalize_chunks(chunks, self.negotiated_mime.as_deref()))
                }
            }
            None if cancel => StopOutcome::Discarded,
            None => StopOutcome::Captured(finalize_chunks(Vec::new(), self.negotiated_mime.as_deref())),
        };

        *lock(&self.levels) = vec![MIN_BAR_HEIGHT as u32; self.config.visualizer_bars];
        self.status.reset();

        match &outcome {
            StopOutcome::Captured(audio) => info!(
                "Recording stopped after {}s: {} bytes of {}",
                self.elapsed_secs(),
                audio.data.len(),
                audio.mime_type
            ),
            _ => info!("Recording cancelled"),
        }
        outcome
    }
}
