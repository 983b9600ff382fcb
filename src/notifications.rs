use log::{error, info, warn};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl ToastLevel {
    /// Accepts the level names used by callers, "error" being an alias of danger.
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "success" => ToastLevel::Success,
            "warning" => ToastLevel::Warning,
            "error" | "danger" => ToastLevel::Danger,
            _ => ToastLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToastLevel::Success => "success",
            ToastLevel::Info => "info",
            ToastLevel::Warning => "warning",
            ToastLevel::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub duration: Duration,
}

impl Toast {
    pub fn new(level: ToastLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            duration: DEFAULT_TOAST_DURATION,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Warning, title, message)
    }

    pub fn danger(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Danger, title, message)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Transient user notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Sends every toast to the log at a matching level.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Danger => error!("[toast] {}: {}", toast.title, toast.message),
            ToastLevel::Warning => warn!("[toast] {}: {}", toast.title, toast.message),
            _ => info!("[toast] {}: {}", toast.title, toast.message),
        }
    }
}

/// Keeps toasts in memory; useful to embedders that poll for them.
#[derive(Default)]
pub struct MemoryNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Toast> {
        let mut toasts = self.toasts.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *toasts)
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_maps_to_danger() {
        assert_eq!(ToastLevel::parse("error"), ToastLevel::Danger);
        assert_eq!(ToastLevel::parse("Warning"), ToastLevel::Warning);
        assert_eq!(ToastLevel::parse("whatever"), ToastLevel::Info);
    }

    #[test]
    fn test_default_duration() {
        let toast = Toast::success("Done", "3 items");
        assert_eq!(toast.duration, Duration::from_secs(5));
        let toast = toast.with_duration(Duration::from_secs(1));
        assert_eq!(toast.duration, Duration::from_secs(1));
    }

    #[test]
    fn test_memory_notifier_drains() {
        let notifier = MemoryNotifier::new();
        notifier.notify(Toast::warning("Careful", "incomplete"));
        assert_eq!(notifier.snapshot().len(), 1);
        assert_eq!(notifier.take()[0].level, ToastLevel::Warning);
        assert!(notifier.take().is_empty());
    }
}
