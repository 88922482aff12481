pub mod levels;
pub mod wav_format;
