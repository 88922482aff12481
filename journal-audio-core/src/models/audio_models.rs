use serde::{Deserialize, Serialize};

/// PCM layout requested from the capture primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub channels: u16,
}

impl AudioFormat {
    pub fn bytes_per_frame(&self) -> u32 {
        u32::from(self.channels) * u32::from(self.bit_depth) / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.bytes_per_frame()
    }

    /// Bits per second of the uncompressed stream.
    pub fn bit_rate(&self) -> u32 {
        self.byte_rate() * 8
    }

    /// Playback length of `data_len` bytes of PCM in this format.
    pub fn duration_ms(&self, data_len: u64) -> u64 {
        let byte_rate = u64::from(self.byte_rate());
        if byte_rate == 0 {
            return 0;
        }
        data_len * 1000 / byte_rate
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            bit_depth: 16,
            channels: 1,
        }
    }
}
