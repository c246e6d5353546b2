//! PCM16 conversion and WAV encoding.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use starlog_core::AudioClip;

/// Little-endian signed 16-bit mono PCM to float samples.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// Float samples to little-endian 16-bit PCM, clamping out-of-range values.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Mono 16-bit RIFF/WAVE bytes for `clip`.
pub fn encode_wav(clip: &AudioClip) -> Vec<u8> {
    let data = f32_to_pcm16(&clip.samples);
    let channels: u16 = 1;
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let byte_rate = clip.sample_rate * block_align as u32;

    let mut buf = Vec::with_capacity(44 + data.len());
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&clip.sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&data);
    buf
}

pub fn write_wav(path: &Path, clip: &AudioClip) -> std::io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(&encode_wav(clip))?;
    f.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_describes_mono_pcm16() {
        let clip = AudioClip {
            samples: vec![0.0, 0.5, -0.5, 2.0],
            sample_rate: 22_050,
        };
        let wav = encode_wav(&clip);
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 22_050);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 8);
        // Clamped to full scale.
        assert_eq!(i16::from_le_bytes([wav[50], wav[51]]), i16::MAX);
    }

    #[test]
    fn raw_pcm_decodes_to_unit_range() {
        let mut raw = Vec::new();
        for v in [0i16, i16::MAX, -i16::MAX] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        raw.push(0x7f); // trailing odd byte is ignored
        assert_eq!(pcm16_to_f32(&raw), vec![0.0, 1.0, -1.0]);
    }
}
