//! 16-bit PCM codec and base64 framing for the live audio stream

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::VoiceError;
use super::protocol::Blob;

/// Mime type for outbound microphone audio at `rate` Hz
pub fn pcm_mime_type(rate: u32) -> String {
    format!("audio/pcm;rate={}", rate)
}

/// f32 samples in [-1, 1] to little-endian 16-bit PCM
///
/// Out-of-range samples are clipped.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            let scaled = (s.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32);
            (scaled as i16).to_le_bytes()
        })
        .collect()
}

/// Little-endian 16-bit PCM to f32 samples; a trailing odd byte is ignored
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

/// Frame microphone samples for the wire
pub fn encode_blob(samples: &[f32], rate: u32) -> Blob {
    Blob {
        mime_type: pcm_mime_type(rate),
        data: STANDARD.encode(encode_pcm16(samples)),
    }
}

/// Decode an inbound base64 PCM payload
pub fn decode_blob(data: &str) -> Result<Vec<f32>, VoiceError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| VoiceError::Audio(format!("invalid base64 audio: {}", e)))?;
    Ok(decode_pcm16(&bytes))
}
