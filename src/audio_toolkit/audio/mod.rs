// Re-export all audio components
pub mod device;
pub mod recorder;
pub mod utils;
pub mod visualizer;

pub use device::{describe_devices, list_input_devices, CpalDeviceInfo};
pub use recorder::{
    negotiate_mime_type, AudioBackend, AudioChunk, AudioInput, CpalBackend, StreamGuard,
    WAV_MIME_TYPE,
};
pub use utils::{base_mime_type, file_extension_for, upload_file_name, FALLBACK_MIME_TYPE};
pub use visualizer::{bar_heights, SpectrumAnalyser};
