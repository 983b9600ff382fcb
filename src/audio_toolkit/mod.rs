pub mod audio;

pub use audio::{
    bar_heights, list_input_devices, negotiate_mime_type, upload_file_name, AudioBackend,
    AudioChunk, AudioInput, CpalBackend, CpalDeviceInfo, SpectrumAnalyser, StreamGuard,
};
