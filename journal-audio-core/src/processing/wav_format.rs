//! RIFF/WAVE header handling for raw PCM captures.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::models::audio_models::AudioFormat;

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Format and payload size read back from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub format: AudioFormat,
    pub data_len: u64,
}

/// Generate a 44-byte PCM WAV header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate
/// [32-33]  block_align
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let block_align = format.channels * format.bit_depth / 8;
    let chunk_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Patch the RIFF and data size fields of a header written with a zero
/// placeholder, once the payload length is known.
pub fn finalize_header<F: Write + Seek>(file: &mut F, data_len: u64) -> std::io::Result<()> {
    let data_size = u32::try_from(data_len).unwrap_or(u32::MAX);
    file.seek(SeekFrom::Start(4))?;
    file.write_all(&36u32.saturating_add(data_size).to_le_bytes())?;
    file.seek(SeekFrom::Start(40))?;
    file.write_all(&data_size.to_le_bytes())?;
    file.seek(SeekFrom::End(0))?;
    Ok(())
}

/// Parse a canonical PCM WAV header.
pub fn parse_wav_header(header: &[u8]) -> Result<WavInfo, String> {
    if header.len() < WAV_HEADER_SIZE {
        return Err(format!("header is {} bytes, expected {}", header.len(), WAV_HEADER_SIZE));
    }
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err("not a RIFF/WAVE file".into());
    }
    if &header[12..16] != b"fmt " || &header[36..40] != b"data" {
        return Err("unsupported chunk layout".into());
    }
    let format_code = u16::from_le_bytes([header[20], header[21]]);
    if format_code != 1 {
        return Err(format!("unsupported format code {format_code}"));
    }

    let format = AudioFormat {
        channels: u16::from_le_bytes([header[22], header[23]]),
        sample_rate: u32::from_le_bytes([header[24], header[25], header[26], header[27]]),
        bit_depth: u16::from_le_bytes([header[34], header[35]]),
    };
    let data_len = u64::from(u32::from_le_bytes([header[40], header[41], header[42], header[43]]));
    Ok(WavInfo { format, data_len })
}

/// Read and parse the header of a WAV file on disk.
pub fn read_wav_info(path: &Path) -> Result<WavInfo, String> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_wav_header(&header)
}
