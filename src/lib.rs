//! fwimage: factory flash image builder for AP firmware.
//!
//! This crate provides:
//! - **Format types** (`format`): alignment, metadata block layout and constants.
//! - **Static assets** (`assets`): header, u-boot and metadata template blobs, with optional `assets.toml`.
//! - **Builder** (`builder`): padded section appender, CRC32, `build_factory_image` for the binary.
//! - **Reader** (`reader`): `ImageReader::open(path, &assets)` decodes and verifies the metadata block.

pub mod assets;
pub mod builder;
pub mod format;
pub mod reader;

pub use assets::{AssetError, AssetManifest, StaticAssets, DEFAULT_ASSET_DIR};
pub use builder::{
    append_section, build_factory_image, build_image, compute_checksum, load_user_images,
    padding_len, write_image_atomic, BuildError, BuildOptions, BuildSummary, BuiltImage,
    UserImages,
};
pub use format::{Metadata, Section, SectionSizes, ALIGNMENT, HEADER_LEN, METADATA_LEN};
pub use reader::{ImageReader, ImageReport, ReadError, SectionSpan};
