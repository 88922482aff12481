//! Chunked AEAD file format.
//!
//! ```text
//! [4-byte magic "JAEF"] [version u8] [12-byte base IV] [chunk size u32 LE]
//! [key id length u16 LE] [key id bytes]
//! [Frame 0: 4-byte LE length | ciphertext | 16-byte tag]
//! [Frame 1: ...]
//! ...
//! ```
//! Frame `i` is sealed with nonce `iv[0..7] || i (u32 BE) || last-flag` and the
//! full header as associated data, so frames cannot be reordered, dropped,
//! truncated or moved between files.

use std::io::{self, BufRead, Read, Write};

use aes_gcm::aead::{AeadInPlace, OsRng};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::encoding::hex_encode;
use super::format::{format_spec, IV_LEN, TAG_LEN};
use crate::models::config::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::models::error::{CryptoError, CryptoResult};

pub const FILE_MAGIC: &[u8; 4] = b"JAEF";

/// Bytes of the base IV that prefix every frame nonce.
const NONCE_PREFIX_LEN: usize = 7;

/// Largest key identifier the header can carry.
const MAX_KEY_ID_LEN: usize = 1024;

/// Parsed stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub version: u8,
    pub iv: [u8; IV_LEN],
    pub chunk_size: u32,
    pub key_identifier: String,
}

impl StreamHeader {
    pub(crate) fn new(version: u8, chunk_size: usize, key_identifier: &str) -> CryptoResult<Self> {
        if key_identifier.len() > MAX_KEY_ID_LEN {
            return Err(CryptoError::Encoding("key identifier too long".into()));
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(CryptoError::Encoding(format!("unsupported chunk size {chunk_size}")));
        }
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        Ok(Self {
            version,
            iv,
            chunk_size: chunk_size as u32,
            key_identifier: key_identifier.to_string(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_MAGIC.len() + 1 + IV_LEN + 6 + self.key_identifier.len());
        out.extend_from_slice(FILE_MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(&(self.key_identifier.len() as u16).to_le_bytes());
        out.extend_from_slice(self.key_identifier.as_bytes());
        out
    }

    /// Read and validate a header. Structural problems are `DecryptionFailed`:
    /// the file is either not ours or has been tampered with.
    pub fn read_from<R: Read>(reader: &mut R) -> CryptoResult<Self> {
        let mut fixed = [0u8; 4 + 1 + IV_LEN + 4 + 2];
        read_exact_or_corrupt(reader, &mut fixed)?;

        if &fixed[0..4] != FILE_MAGIC {
            return Err(CryptoError::DecryptionFailed);
        }
        let version = fixed[4];
        format_spec(version)?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&fixed[5..5 + IV_LEN]);
        let offset = 5 + IV_LEN;
        let chunk_size = u32::from_le_bytes([fixed[offset], fixed[offset + 1], fixed[offset + 2], fixed[offset + 3]]);
        let key_id_len = u16::from_le_bytes([fixed[offset + 4], fixed[offset + 5]]) as usize;

        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&(chunk_size as usize)) || key_id_len > MAX_KEY_ID_LEN {
            return Err(CryptoError::DecryptionFailed);
        }

        let mut key_id = vec![0u8; key_id_len];
        read_exact_or_corrupt(reader, &mut key_id)?;
        let key_identifier = String::from_utf8(key_id).map_err(|_| CryptoError::DecryptionFailed)?;

        Ok(Self {
            version,
            iv,
            chunk_size,
            key_identifier,
        })
    }

    fn frame_nonce(&self, index: u32, last: bool) -> [u8; IV_LEN] {
        let mut nonce = [0u8; IV_LEN];
        nonce[..NONCE_PREFIX_LEN].copy_from_slice(&self.iv[..NONCE_PREFIX_LEN]);
        nonce[NONCE_PREFIX_LEN..NONCE_PREFIX_LEN + 4].copy_from_slice(&index.to_be_bytes());
        nonce[IV_LEN - 1] = u8::from(last);
        nonce
    }
}

/// Totals reported by a stream operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamSummary {
    pub plaintext_len: u64,
    pub sealed_len: u64,
    pub checksum: String,
}

/// Seal everything from `reader` into `writer`.
pub(crate) fn encrypt_stream<R: Read, W: Write>(
    cipher: &Aes256Gcm,
    header: &StreamHeader,
    reader: &mut R,
    writer: &mut W,
) -> CryptoResult<StreamSummary> {
    let chunk_size = header.chunk_size as usize;
    let header_bytes = header.encode();
    writer
        .write_all(&header_bytes)
        .map_err(|e| CryptoError::io("failed to write header", e))?;

    let mut hasher = Sha256::new();
    let mut plaintext_len = 0u64;
    let mut sealed_len = header_bytes.len() as u64;

    let mut current = read_chunk(reader, chunk_size)?;
    let mut index = 0u32;
    loop {
        // A short chunk is always the last; a full one is last only if nothing follows.
        let next = if current.len() == chunk_size {
            read_chunk(reader, chunk_size)?
        } else {
            Zeroizing::new(Vec::new())
        };
        let last = next.is_empty();

        hasher.update(current.as_slice());
        plaintext_len += current.len() as u64;

        let nonce = header.frame_nonce(index, last);
        let mut frame = current.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), &header_bytes, &mut frame)
            .map_err(|_| CryptoError::Encoding(format!("AES-GCM encryption of frame {index} failed")))?;

        let frame_len = (frame.len() + TAG_LEN) as u32;
        writer
            .write_all(&frame_len.to_le_bytes())
            .and_then(|_| writer.write_all(&frame))
            .and_then(|_| writer.write_all(&tag))
            .map_err(|e| CryptoError::io("failed to write frame", e))?;
        sealed_len += 4 + u64::from(frame_len);

        if last {
            break;
        }
        current = next;
        index = index
            .checked_add(1)
            .ok_or_else(|| CryptoError::Encoding("input exceeds the maximum frame count".into()))?;
    }

    Ok(StreamSummary {
        plaintext_len,
        sealed_len,
        checksum: hex_encode(&hasher.finalize()),
    })
}

/// Open a sealed stream whose header has already been read.
///
/// Each frame's tag is verified before its plaintext is written. On error the
/// caller must discard whatever reached `writer`.
pub(crate) fn decrypt_stream<R: BufRead, W: Write>(
    cipher: &Aes256Gcm,
    header: &StreamHeader,
    reader: &mut R,
    writer: &mut W,
) -> CryptoResult<StreamSummary> {
    let header_bytes = header.encode();
    let max_frame = header.chunk_size as usize + TAG_LEN;

    let mut hasher = Sha256::new();
    let mut plaintext_len = 0u64;
    let mut sealed_len = header_bytes.len() as u64;
    let mut index = 0u32;

    loop {
        let mut len_bytes = [0u8; 4];
        // Running out of frames before the last-flagged one means truncation.
        read_exact_or_corrupt(reader, &mut len_bytes)?;
        let frame_len = u32::from_le_bytes(len_bytes) as usize;
        if !(TAG_LEN..=max_frame).contains(&frame_len) {
            return Err(CryptoError::DecryptionFailed);
        }

        let mut frame = Zeroizing::new(vec![0u8; frame_len]);
        read_exact_or_corrupt(reader, &mut frame)?;
        sealed_len += 4 + frame_len as u64;

        let last = reader
            .fill_buf()
            .map_err(|e| CryptoError::io("failed to read sealed file", e))?
            .is_empty();

        let body_len = frame_len - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&frame[body_len..]);
        frame.truncate(body_len);

        let nonce = header.frame_nonce(index, last);
        cipher
            .decrypt_in_place_detached(Nonce::from_slice(&nonce), &header_bytes, &mut frame, Tag::from_slice(&tag))
            .map_err(|_| CryptoError::DecryptionFailed)?;

        hasher.update(frame.as_slice());
        plaintext_len += frame.len() as u64;
        writer
            .write_all(&frame)
            .map_err(|e| CryptoError::io("failed to write plaintext", e))?;

        if last {
            break;
        }
        index = index.checked_add(1).ok_or(CryptoError::DecryptionFailed)?;
    }

    Ok(StreamSummary {
        plaintext_len,
        sealed_len,
        checksum: hex_encode(&hasher.finalize()),
    })
}

/// Fill up to `chunk_size` bytes, stopping early only at end of input.
fn read_chunk<R: Read>(reader: &mut R, chunk_size: usize) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(vec![0u8; chunk_size]);
    let mut filled = 0;
    while filled < chunk_size {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CryptoError::io("failed to read input", e)),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

fn read_exact_or_corrupt<R: Read>(reader: &mut R, buf: &mut [u8]) -> CryptoResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CryptoError::DecryptionFailed
        } else {
            CryptoError::io("failed to read sealed data", e)
        }
    })
}
