use super::device::find_input_device;
use super::utils::samples_to_wav_bytes;
use super::visualizer::{SpectrumAnalyser, FFT_SIZE};
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SizedSample, StreamConfig};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// One piece of encoded audio handed over by the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: Some(mime_type.into()),
        }
    }
}

/// An open microphone with a running recorder.
pub trait AudioInput: Send {
    /// Encoding the recorder actually produces, which may differ from the
    /// one requested.
    fn mime_type(&self) -> Option<String>;

    /// Current byte spectrum of the live input.
    fn frequency_data(&mut self, out: &mut [u8]);

    /// Halt the recorder and hand back everything it produced.
    fn finish(&mut self) -> Vec<AudioChunk>;

    /// Free the microphone. Must tolerate being called after `finish`.
    fn release(&mut self);
}

/// Something that can open microphones.
pub trait AudioBackend: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn open(&self, requested_mime: Option<&str>) -> Result<Box<dyn AudioInput>, CaptureError>;
}

/// First preferred encoding the backend can record, if any.
pub fn negotiate_mime_type(backend: &dyn AudioBackend, preferred: &[String]) -> Option<String> {
    preferred
        .iter()
        .find(|mime| backend.is_type_supported(mime))
        .cloned()
}

/// Owns an open input and guarantees it is released exactly once, including
/// when the guard is dropped on an early return.
pub struct StreamGuard {
    input: Option<Box<dyn AudioInput>>,
}

impl StreamGuard {
    pub fn new(input: Box<dyn AudioInput>) -> Self {
        Self { input: Some(input) }
    }

    /// Returns false once the input has been released.
    pub fn frequency_data(&mut self, out: &mut [u8]) -> bool {
        match self.input.as_mut() {
            Some(input) => {
                input.frequency_data(out);
                true
            }
            None => false,
        }
    }

    /// Finish recording, release the microphone, return the chunks.
    pub fn finish(&mut self) -> Vec<AudioChunk> {
        match self.input.take() {
            Some(mut input) => {
                let chunks = input.finish();
                input.release();
                chunks
            }
            None => Vec::new(),
        }
    }

    /// Release without collecting audio. Returns whether anything was open.
    pub fn release(&mut self) -> bool {
        match self.input.take() {
            Some(mut input) => {
                input.release();
                true
            }
            None => false,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.release() {
            debug!("Released microphone on guard drop");
        }
    }
}

/* ---------- cpal backend ------------------------------------------------- */

/// Shared buffers written from the audio callback.
#[derive(Clone, Default)]
struct CaptureSink {
    samples: Arc<Mutex<Vec<f32>>>,
    recent: Arc<Mutex<VecDeque<f32>>>,
}

impl CaptureSink {
    /// Down-mix interleaved frames to mono and append them.
    fn push_frames<T: Copy>(&self, data: &[T], channels: usize, convert: impl Fn(T) -> f32) {
        let mono: Vec<f32> = data
            .chunks(channels.max(1))
            .map(|frame| frame.iter().map(|s| convert(*s)).sum::<f32>() / frame.len() as f32)
            .collect();

        if let Ok(mut all) = self.samples.lock() {
            all.extend_from_slice(&mono);
        }
        if let Ok(mut recent) = self.recent.lock() {
            for sample in mono {
                if recent.len() == FFT_SIZE {
                    recent.pop_front();
                }
                recent.push_back(sample);
            }
        }
    }

    fn recent(&self) -> Vec<f32> {
        self.recent
            .lock()
            .map(|recent| recent.iter().copied().collect())
            .unwrap_or_default()
    }

    fn take_samples(&self) -> Vec<f32> {
        let mut guard = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    sink: CaptureSink,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            sink.push_frames(data, channels, <f32 as FromSample<T>>::from_sample_);
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )
}

fn open_stream(
    device_name: Option<&str>,
    sink: CaptureSink,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let device = find_input_device(device_name).ok_or_else(|| {
        CaptureError::Unsupported(match device_name {
            Some(name) => format!("input device '{}' not found", name),
            None => "no input device available".to_string(),
        })
    })?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();

    debug!(
        "Opening input '{}': format={:?} rate={}Hz channels={}",
        device.name().unwrap_or_default(),
        format,
        sample_rate,
        config.channels
    );

    let stream = match format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, sink),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, sink),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, sink),
        cpal::SampleFormat::I32 => build_input::<i32>(&device, &config, sink),
        cpal::SampleFormat::U8 => build_input::<u8>(&device, &config, sink),
        other => {
            return Err(CaptureError::Unsupported(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;

    Ok((stream, sample_rate))
}

/// Microphone capture through cpal. Records PCM and encodes it as WAV.
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl AudioBackend for CpalBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        mime_type.eq_ignore_ascii_case(WAV_MIME_TYPE)
    }

    fn open(&self, requested_mime: Option<&str>) -> Result<Box<dyn AudioInput>, CaptureError> {
        if let Some(requested) = requested_mime {
            if !self.is_type_supported(requested) {
                debug!("{} not available, recording {}", requested, WAV_MIME_TYPE);
            }
        }

        let sink = CaptureSink::default();
        let worker_sink = sink.clone();
        let device_name = self.device_name.clone();
        let (init_tx, init_rx) = mpsc::channel::<Result<u32, CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        // cpal::Stream is not Send, so a dedicated thread owns it until told to stop.
        let worker = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), worker_sink) {
                    Ok((stream, rate)) => {
                        let _ = init_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                // Either an explicit stop or the sender being dropped ends capture.
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause input stream: {}", e);
                }
                drop(stream);
                debug!("Microphone stream closed");
            })
            .map_err(|e| CaptureError::Unsupported(format!("capture thread: {}", e)))?;

        let sample_rate = match init_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(CaptureError::Unsupported(
                    "capture thread exited before opening the stream".to_string(),
                ));
            }
        };

        info!("Microphone opened at {} Hz", sample_rate);
        Ok(Box::new(CpalInput {
            sink,
            sample_rate,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
            analyser: SpectrumAnalyser::new(),
        }))
    }
}

struct CpalInput {
    sink: CaptureSink,
    sample_rate: u32,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
    analyser: SpectrumAnalyser,
}

impl CpalInput {
    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

impl AudioInput for CpalInput {
    fn mime_type(&self) -> Option<String> {
        Some(WAV_MIME_TYPE.to_string())
    }

    fn frequency_data(&mut self, out: &mut [u8]) {
        let recent = self.sink.recent();
        self.analyser.byte_frequency_data(&recent, out);
    }

    fn finish(&mut self) -> Vec<AudioChunk> {
        self.shutdown();
        let samples = self.sink.take_samples();
        if samples.is_empty() {
            warn!("No samples captured");
            return Vec::new();
        }

        match samples_to_wav_bytes(&samples, self.sample_rate) {
            Ok(bytes) => vec![AudioChunk::new(bytes, WAV_MIME_TYPE)],
            Err(e) => {
                error!("Failed to encode recording: {:#}", e);
                Vec::new()
            }
        }
    }

    fn release(&mut self) {
        self.shutdown();
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.shutdown();
    }
}
