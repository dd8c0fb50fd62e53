//! Static device-family blobs: image header, u-boot, metadata header/footer templates.
//!
//! Loaded verbatim from an asset directory and never interpreted. File names default to
//! `header.bin`, `uboot.bin`, `metadata_header.bin` and `metadata_footer.bin`; an optional
//! `assets.toml` in the same directory can point any of them elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::format::HEADER_LEN;

/// Default asset directory, relative to the working directory.
pub const DEFAULT_ASSET_DIR: &str = "static";

/// Name of the optional override manifest inside the asset directory.
pub const ASSET_MANIFEST: &str = "assets.toml";

/// Errors produced while loading static assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "serde")]
    #[error("invalid asset manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// File names of the four static blobs. Relative paths resolve against the asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct AssetManifest {
    pub header: PathBuf,
    pub uboot: PathBuf,
    pub metadata_header: PathBuf,
    pub metadata_footer: PathBuf,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            header: PathBuf::from("header.bin"),
            uboot: PathBuf::from("uboot.bin"),
            metadata_header: PathBuf::from("metadata_header.bin"),
            metadata_footer: PathBuf::from("metadata_footer.bin"),
        }
    }
}

impl AssetManifest {
    /// Parse a manifest from TOML text. Missing keys keep their default file name.
    #[cfg(feature = "serde")]
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read `assets.toml` from `dir` if present, otherwise return the defaults.
    pub fn discover(dir: &Path) -> Result<Self, AssetError> {
        let path = dir.join(ASSET_MANIFEST);
        if !path.is_file() {
            return Ok(Self::default());
        }
        #[cfg(feature = "serde")]
        {
            let text = read_blob(&path)?;
            let text = String::from_utf8_lossy(&text);
            debug!("using asset manifest {}", path.display());
            Self::from_toml(&text).map_err(|source| AssetError::Manifest { path, source })
        }
        #[cfg(not(feature = "serde"))]
        {
            warn!("ignoring {} (built without serde)", path.display());
            Ok(Self::default())
        }
    }
}

/// The four static blobs, loaded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAssets {
    /// Fixed image header; expected to be exactly [`HEADER_LEN`] bytes.
    pub header: Vec<u8>,
    pub uboot: Vec<u8>,
    pub metadata_header: Vec<u8>,
    pub metadata_footer: Vec<u8>,
}

impl StaticAssets {
    /// Load the blobs named by `manifest` from `dir`.
    pub fn load_with(dir: &Path, manifest: &AssetManifest) -> Result<Self, AssetError> {
        let assets = StaticAssets {
            header: read_blob(&dir.join(&manifest.header))?,
            uboot: read_blob(&dir.join(&manifest.uboot))?,
            metadata_header: read_blob(&dir.join(&manifest.metadata_header))?,
            metadata_footer: read_blob(&dir.join(&manifest.metadata_footer))?,
        };
        if assets.header.len() != HEADER_LEN {
            warn!(
                "image header is {} bytes, expected {}; using it as-is",
                assets.header.len(),
                HEADER_LEN
            );
        }
        Ok(assets)
    }

    /// Load the blobs from `dir`, honouring `assets.toml` when present.
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        let manifest = AssetManifest::discover(dir)?;
        Self::load_with(dir, &manifest)
    }
}

/// Read a whole file, attaching the path to any error.
pub fn read_blob(path: &Path) -> Result<Vec<u8>, AssetError> {
    let data = fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loaded {} ({} bytes)", path.display(), data.len());
    Ok(data)
}
