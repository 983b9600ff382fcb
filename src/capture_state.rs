use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of one capture session.
///
/// The elapsed timer and the visualiser both check this before each
/// reschedule, so flipping it out of RECORDING is enough to wind them down.
pub struct CaptureStatus(AtomicU8);

impl CaptureStatus {
    pub const IDLE: u8 = 0;
    pub const RECORDING: u8 = 1;
    pub const STOPPING: u8 = 2;

    pub fn new() -> Self {
        Self(AtomicU8::new(Self::IDLE))
    }

    fn advance(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Idle → Recording; false if a session is already running.
    pub fn try_start(&self) -> bool {
        self.advance(Self::IDLE, Self::RECORDING)
    }

    /// Recording → Stopping. A second stop (user and timeout racing) gets
    /// false and does nothing.
    pub fn try_stop(&self) -> bool {
        self.advance(Self::RECORDING, Self::STOPPING)
    }

    pub fn reset(&self) {
        self.0.store(Self::IDLE, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.current() == Self::RECORDING
    }

    pub fn current(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self::new()
    }
}
