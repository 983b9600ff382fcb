use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub const FFT_SIZE: usize = 128;
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

pub const MIN_BAR_HEIGHT: f64 = 6.0;
pub const MAX_BAR_HEIGHT: f64 = 54.0;

/// Byte spectrum of the most recent input window, smoothed over frames.
///
/// Mirrors what a browser analyser node reports: Blackman window, magnitude
/// scaled by the FFT size, exponential smoothing between frames, then a
/// linear map of -100..-30 dB onto 0..255.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyser {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        let window = (0..FFT_SIZE)
            .map(|i| {
                let x = i as f32 / FFT_SIZE as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft,
            window,
            smoothed: vec![0.0; FFT_SIZE / 2],
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    pub fn bin_count(&self) -> usize {
        FFT_SIZE / 2
    }

    /// Fill `out` with up to `bin_count()` byte levels computed from the last
    /// `FFT_SIZE` samples of `recent` (zero-padded at the front when short).
    pub fn byte_frequency_data(&mut self, recent: &[f32], out: &mut [u8]) {
        let start = recent.len().saturating_sub(FFT_SIZE);
        let window_samples = &recent[start..];
        let pad = FFT_SIZE - window_samples.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { window_samples[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        for (k, level) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / FFT_SIZE as f32;
            *level = SMOOTHING_TIME_CONSTANT * *level + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
        }

        for (byte, level) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = if *level > 0.0 {
                20.0 * level.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

/// Bar heights for `bars` bars given one frame of byte spectrum.
///
/// Only the lower part of the spectrum (where speech energy sits) drives the
/// bars; `elapsed_ms` feeds a small per-bar wobble so a steady tone still
/// looks alive.
pub fn bar_heights(bins: &[u8], bars: usize, elapsed_ms: f64) -> Vec<u32> {
    let focus_bins = ((bins.len() as f64 * 0.35).floor() as usize).max(4);
    let bin = |idx: usize| bins.get(idx).copied().unwrap_or(0) as f64 / 255.0;

    let peak = (0..focus_bins).map(bin).fold(0.0_f64, f64::max);

    (0..bars)
        .map(|i| {
            let ratio = if bars == 1 {
                0.0
            } else {
                i as f64 / (bars - 1) as f64
            };
            let value = bin((ratio * (focus_bins - 1) as f64).floor() as usize);
            let wobble = 0.85 + 0.15 * (elapsed_ms / 140.0 + 0.9 * i as f64).sin();
            let mixed = (0.65 * peak + 0.35 * value) * wobble;
            (MIN_BAR_HEIGHT + mixed.min(1.0) * (MAX_BAR_HEIGHT - MIN_BAR_HEIGHT)).round() as u32
        })
        .collect()
}
