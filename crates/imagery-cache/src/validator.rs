//! Payload validation for cached images

use std::fmt;

/// Smallest payload accepted as a real image tile
pub const DEFAULT_MIN_IMAGE_BYTES: usize = 10_000;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// File extension of stored blobs
pub const IMAGE_EXTENSION: &str = "png";

/// Why a payload was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooSmall { size: usize, min: usize },
    BadSignature,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooSmall { size, min } => {
                write!(f, "{} bytes is below the {} byte minimum", size, min)
            }
            Rejection::BadSignature => write!(f, "missing PNG signature"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    min_bytes: usize,
}

impl Validator {
    pub fn new(min_bytes: usize) -> Self {
        Self { min_bytes }
    }

    pub fn min_bytes(&self) -> usize {
        self.min_bytes
    }

    /// Size is checked before the signature, so a truncated file reports `TooSmall`
    pub fn check(&self, bytes: &[u8]) -> Result<(), Rejection> {
        if bytes.len() < self.min_bytes {
            return Err(Rejection::TooSmall {
                size: bytes.len(),
                min: self.min_bytes,
            });
        }
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Err(Rejection::BadSignature);
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_IMAGE_BYTES)
    }
}

#[cfg(test)]
pub(crate) fn png_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len.max(PNG_SIGNATURE.len())];
    data[..PNG_SIGNATURE.len()].copy_from_slice(&PNG_SIGNATURE);
    data.truncate(len);
    data
}
