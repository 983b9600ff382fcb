use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::debug;
use std::io::Cursor;

pub const FALLBACK_MIME_TYPE: &str = "audio/webm";

/// Encode mono f32 samples as a 16-bit PCM WAV file held in memory.
pub fn samples_to_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;

    // Convert f32 samples to i16 for WAV
    for sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(sample_i16)?;
    }

    writer.finalize()?;
    let bytes = cursor.into_inner();
    debug!(
        "Encoded {} samples at {} Hz into {} WAV bytes",
        samples.len(),
        sample_rate,
        bytes.len()
    );
    Ok(bytes)
}

/// `audio/webm;codecs=opus` -> `audio/webm`
pub fn base_mime_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension the recognition endpoint expects for an upload of this type.
pub fn file_extension_for(mime_type: &str) -> &'static str {
    match base_mime_type(mime_type).as_str() {
        "audio/webm" => ".webm",
        "audio/mp4" => ".mp4",
        "audio/mpeg" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/flac" => ".flac",
        "audio/x-m4a" | "audio/m4a" => ".m4a",
        _ => ".raw",
    }
}

pub fn upload_file_name(mime_type: &str) -> String {
    format!("recording{}", file_extension_for(mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_ignores_codec_parameters() {
        assert_eq!(upload_file_name("audio/webm;codecs=opus"), "recording.webm");
        assert_eq!(upload_file_name("audio/webm"), "recording.webm");
        assert_eq!(upload_file_name("audio/ogg; codecs=opus"), "recording.ogg");
        assert_eq!(upload_file_name("audio/mpeg"), "recording.mp3");
        assert_eq!(upload_file_name("audio/wav"), "recording.wav");
        assert_eq!(upload_file_name("video/quicktime"), "recording.raw");
    }

    #[test]
    fn test_wav_bytes_carry_header_and_samples() {
        let bytes = samples_to_wav_bytes(&[0.0, 0.5, -0.5, 1.0], 16000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header + 4 samples * 2 bytes
        assert_eq!(bytes.len(), 44 + 8);

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 4);
    }
}
