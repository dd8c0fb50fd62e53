//! Factory image builder: append padded sections, checksum, metadata block, footer.
//!
//! Used by the build-factory-image binary. The whole image is assembled in memory and
//! written once, so a failed run never leaves a partial output behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::assets::{read_blob, AssetError, StaticAssets};
use crate::format::{Metadata, Section, SectionSizes, ALIGNMENT, HEADER_LEN};

/// Errors produced by the builder.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} section too large for a 32-bit size field ({size} bytes)", section.display_name())]
    SectionTooLarge { section: Section, size: u64 },
}

/// Number of zero bytes appended after a section of `section_len` bytes written at
/// `current_len`.
///
/// Always in `1..=alignment`: a section that already ends on the boundary still gets a
/// full block of padding. Firmware loaders expect exactly this layout.
#[must_use]
pub fn padding_len(current_len: usize, section_len: usize, alignment: usize) -> usize {
    alignment - ((current_len + section_len) % alignment)
}

/// Append `section` plus its padding to `buf`. Returns the padded section length.
pub fn append_section(buf: &mut Vec<u8>, section: &[u8], alignment: usize) -> usize {
    let pad = padding_len(buf.len(), section.len(), alignment);
    buf.reserve(section.len() + pad);
    buf.extend_from_slice(section);
    buf.resize(buf.len() + pad, 0);
    section.len() + pad
}

/// zlib CRC32 of everything after the fixed header.
#[must_use]
pub fn compute_checksum(buf: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(buf.get(HEADER_LEN..).unwrap_or_default());
    hasher.finalize()
}

/// Caller-supplied images.
#[derive(Debug, Clone, Default)]
pub struct UserImages {
    pub kernel: Vec<u8>,
    pub rootfs: Vec<u8>,
    /// Secondary kernel (kernel + ramdisk). `None` reuses the primary kernel.
    pub ramdisk: Option<Vec<u8>>,
}

impl UserImages {
    /// Bytes placed in the backup kernel section.
    #[must_use]
    pub fn secondary_kernel(&self) -> &[u8] {
        self.ramdisk.as_deref().unwrap_or(&self.kernel)
    }
}

/// Read the kernel, rootfs and optional ramdisk images, in that order.
pub fn load_user_images(
    kernel: &Path,
    rootfs: &Path,
    ramdisk: Option<&Path>,
) -> Result<UserImages, AssetError> {
    let kernel = read_blob(kernel)?;
    let rootfs = read_blob(rootfs)?;
    let ramdisk = ramdisk.map(read_blob).transpose()?;
    if ramdisk.is_none() {
        debug!("no ramdisk given, reusing kernel as backup kernel");
    }
    Ok(UserImages {
        kernel,
        rootfs,
        ramdisk,
    })
}

/// A fully assembled image.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub bytes: Vec<u8>,
    pub sizes: SectionSizes,
    pub metadata: Metadata,
}

/// Assemble the image in memory.
pub fn build_image(assets: &StaticAssets, images: &UserImages) -> Result<BuiltImage, BuildError> {
    let mut buf = assets.header.clone();

    let mut sizes = SectionSizes::default();
    for section in Section::ALL {
        let data: &[u8] = match section {
            Section::Rootfs => &images.rootfs,
            Section::Kernel => &images.kernel,
            Section::Uboot => &assets.uboot,
            Section::Ramdisk => images.secondary_kernel(),
        };
        let offset = buf.len();
        let padded = append_section(&mut buf, data, ALIGNMENT);
        debug!(
            "{}: {} bytes at 0x{:x}, padded to {}",
            section.display_name(),
            data.len(),
            offset,
            padded
        );
        let padded = u32::try_from(padded).map_err(|_| BuildError::SectionTooLarge {
            section,
            size: padded as u64,
        })?;
        match section {
            Section::Rootfs => sizes.rootfs = padded,
            Section::Kernel => sizes.kernel = padded,
            Section::Uboot => sizes.uboot = padded,
            Section::Ramdisk => sizes.ramdisk = padded,
        }
    }

    buf.extend_from_slice(&assets.metadata_header);

    let checksum = compute_checksum(&buf);
    info!(
        "checksum 0x{:08x} over {} bytes",
        checksum,
        buf.len().saturating_sub(HEADER_LEN)
    );

    let metadata = Metadata::new(checksum, &sizes);
    let block = metadata.to_bytes().ok_or(BuildError::SectionTooLarge {
        section: Section::Ramdisk,
        size: u64::from(sizes.ramdisk),
    })?;
    buf.extend_from_slice(&block);
    buf.extend_from_slice(&assets.metadata_footer);

    Ok(BuiltImage {
        bytes: buf,
        sizes,
        metadata,
    })
}

/// Write `bytes` to `path` through a temporary file in the same directory, replacing any
/// existing file only once the data is on disk.
pub fn write_image_atomic(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let write_err = |source: std::io::Error| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Inputs for a whole build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub output: PathBuf,
    pub kernel: PathBuf,
    pub rootfs: PathBuf,
    pub ramdisk: Option<PathBuf>,
    /// Directory holding the static blobs.
    pub asset_dir: PathBuf,
}

/// Result of a build run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BuildSummary {
    pub output: PathBuf,
    pub image_len: u64,
    pub sizes: SectionSizes,
    pub metadata: Metadata,
}

/// Load every input, build the image and write it. Nothing is written unless every
/// input could be read and the image could be assembled.
pub fn build_factory_image(options: &BuildOptions) -> Result<BuildSummary, BuildError> {
    let assets = StaticAssets::load(&options.asset_dir)?;
    let images = load_user_images(&options.kernel, &options.rootfs, options.ramdisk.as_deref())?;

    let image = build_image(&assets, &images)?;
    write_image_atomic(&options.output, &image.bytes)?;
    info!(
        "wrote {} ({} bytes)",
        options.output.display(),
        image.bytes.len()
    );

    Ok(BuildSummary {
        output: options.output.clone(),
        image_len: image.bytes.len() as u64,
        sizes: image.sizes,
        metadata: image.metadata,
    })
}
