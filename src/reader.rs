//! Factory image reader: locate and decode the metadata block, verify the checksum.
//!
//! Only the block this crate writes is decoded. Section contents are never interpreted.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::assets::StaticAssets;
use crate::builder::compute_checksum;
use crate::format::{Metadata, Section, SectionSizes, METADATA_LEN};

/// Errors produced by the image reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[error("image header does not match the static header blob")]
    HeaderMismatch,
    #[error("metadata footer does not match the static footer blob")]
    FooterMismatch,
    #[error("metadata header template does not match at offset 0x{offset:x}")]
    TemplateMismatch { offset: usize },
    #[error("metadata block at offset 0x{offset:x} has invalid constant fields")]
    InvalidMetadata { offset: usize },
    #[error("section sizes end at 0x{expected:x} but metadata block is at 0x{found:x}")]
    InconsistentLayout { expected: u64, found: u64 },
    #[error("checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Location of one padded section inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SectionSpan {
    pub section: Section,
    /// Absolute byte offset in the image.
    pub offset: u64,
    /// Padded length.
    pub len: u32,
}

/// Summary of a verified image, for display.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageReport {
    pub image_len: u64,
    pub metadata_offset: u64,
    pub metadata: Metadata,
    pub sections: Vec<SectionSpan>,
    pub sha256: String,
}

/// A parsed and verified factory image.
pub struct ImageReader {
    /// Whole image.
    bytes: Vec<u8>,
    /// Decoded metadata block.
    pub metadata: Metadata,
    /// Length of the leading header blob; sections start here.
    header_len: usize,
    /// Byte offset of the metadata block.
    metadata_offset: usize,
}

impl ImageReader {
    /// Read an image file and verify it against the static assets it was built with.
    pub fn open<P: AsRef<Path>>(path: P, assets: &StaticAssets) -> Result<Self, ReadError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes, assets)
    }

    /// Verify an in-memory image against the static assets it was built with.
    pub fn from_bytes(bytes: Vec<u8>, assets: &StaticAssets) -> Result<Self, ReadError> {
        let header_len = assets.header.len();
        let template_len = assets.metadata_header.len();
        let footer_len = assets.metadata_footer.len();
        let min = header_len + template_len + METADATA_LEN + footer_len;
        if bytes.len() < min {
            return Err(ReadError::TooShort {
                len: bytes.len(),
                min,
            });
        }

        if !bytes.starts_with(&assets.header) {
            return Err(ReadError::HeaderMismatch);
        }
        if !bytes.ends_with(&assets.metadata_footer) {
            return Err(ReadError::FooterMismatch);
        }

        let metadata_offset = bytes.len() - footer_len - METADATA_LEN;
        let template_offset = metadata_offset - template_len;
        if bytes[template_offset..metadata_offset] != assets.metadata_header[..] {
            return Err(ReadError::TemplateMismatch {
                offset: template_offset,
            });
        }

        let mut block = [0u8; METADATA_LEN];
        block.copy_from_slice(&bytes[metadata_offset..metadata_offset + METADATA_LEN]);
        let metadata = Metadata::from_bytes(&block).ok_or(ReadError::InvalidMetadata {
            offset: metadata_offset,
        })?;

        let expected = header_len as u64 + metadata.sizes().total() + template_len as u64;
        if expected != metadata_offset as u64 {
            return Err(ReadError::InconsistentLayout {
                expected,
                found: metadata_offset as u64,
            });
        }

        let computed = compute_checksum(&bytes[..metadata_offset]);
        if computed != metadata.crc32_checksum {
            return Err(ReadError::ChecksumMismatch {
                stored: metadata.crc32_checksum,
                computed,
            });
        }

        Ok(ImageReader {
            bytes,
            metadata,
            header_len,
            metadata_offset,
        })
    }

    /// Padded section sizes recorded in the metadata block.
    #[must_use]
    pub fn sizes(&self) -> SectionSizes {
        self.metadata.sizes()
    }

    /// Offsets and padded lengths of the four sections, in image order.
    #[must_use]
    pub fn sections(&self) -> Vec<SectionSpan> {
        let sizes = self.sizes();
        let mut offset = self.header_len as u64;
        Section::ALL
            .iter()
            .map(|&section| {
                let span = SectionSpan {
                    section,
                    offset,
                    len: sizes.get(section),
                };
                offset += u64::from(span.len);
                span
            })
            .collect()
    }

    /// Padded bytes of one section.
    #[must_use]
    pub fn section(&self, section: Section) -> &[u8] {
        match self.sections().into_iter().find(|s| s.section == section) {
            Some(span) => {
                let start = span.offset as usize;
                &self.bytes[start..start + span.len as usize]
            }
            None => &[],
        }
    }

    /// Byte offset of the metadata block.
    #[must_use]
    pub fn metadata_offset(&self) -> usize {
        self.metadata_offset
    }

    /// Whole image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex SHA-256 of the whole image.
    #[must_use]
    pub fn sha256(&self) -> String {
        Sha256::digest(&self.bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    #[must_use]
    pub fn report(&self) -> ImageReport {
        ImageReport {
            image_len: self.bytes.len() as u64,
            metadata_offset: self.metadata_offset as u64,
            metadata: self.metadata,
            sections: self.sections(),
            sha256: self.sha256(),
        }
    }
}
