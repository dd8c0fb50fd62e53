//! Reader tests: verify built images and detect corruption.

use fwimage::{
    build_image, ImageReader, ReadError, Section, StaticAssets, UserImages, HEADER_LEN,
    METADATA_LEN,
};

fn test_assets() -> StaticAssets {
    StaticAssets {
        header: (0u8..32).collect(),
        uboot: b"u-boot".to_vec(),
        metadata_header: vec![0x5A; 24],
        metadata_footer: b"FOOTER".to_vec(),
    }
}

fn test_images() -> UserImages {
    UserImages {
        kernel: b"kernel image".to_vec(),
        rootfs: vec![0x68; 100],
        ramdisk: Some(b"kernel + ramdisk".to_vec()),
    }
}

#[test]
fn reader_accepts_built_image() {
    let assets = test_assets();
    let image = build_image(&assets, &test_images()).unwrap();
    let reader = ImageReader::from_bytes(image.bytes.clone(), &assets).unwrap();

    assert_eq!(reader.metadata, image.metadata);
    assert_eq!(reader.sizes(), image.sizes);
    assert_eq!(
        reader.metadata_offset(),
        image.bytes.len() - METADATA_LEN - assets.metadata_footer.len()
    );

    let spans = reader.sections();
    assert_eq!(spans[0].section, Section::Rootfs);
    assert_eq!(spans[0].offset, HEADER_LEN as u64);
    assert_eq!(
        spans[1].offset,
        HEADER_LEN as u64 + u64::from(reader.metadata.squashfs_size)
    );

    assert!(reader.section(Section::Kernel).starts_with(b"kernel image"));
    assert!(reader.section(Section::Uboot).starts_with(b"u-boot"));
    assert!(reader.section(Section::Ramdisk).starts_with(b"kernel + ramdisk"));
    assert_eq!(reader.section(Section::Rootfs).len(), 112);
}

#[test]
fn reader_detects_payload_corruption() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    bytes[HEADER_LEN + 5] ^= 0xFF;

    match ImageReader::from_bytes(bytes, &assets) {
        Err(ReadError::ChecksumMismatch { stored, computed }) => assert_ne!(stored, computed),
        Err(e) => panic!("expected checksum mismatch, got {}", e),
        Ok(_) => panic!("expected checksum mismatch"),
    }
}

/// The header is outside the checksum; only the header blob comparison catches it.
#[test]
fn reader_detects_header_change() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    bytes[0] ^= 0xFF;
    assert!(matches!(
        ImageReader::from_bytes(bytes, &assets),
        Err(ReadError::HeaderMismatch)
    ));
}

#[test]
fn reader_detects_wrong_footer() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    let last = bytes.len() - 1;
    bytes[last] = b'X';
    assert!(matches!(
        ImageReader::from_bytes(bytes, &assets),
        Err(ReadError::FooterMismatch)
    ));
}

#[test]
fn reader_detects_bad_constant_field() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    let block = bytes.len() - assets.metadata_footer.len() - METADATA_LEN;
    // Marker word (0x07) follows the three reserved words.
    bytes[block + 28] = 0x08;
    assert!(matches!(
        ImageReader::from_bytes(bytes, &assets),
        Err(ReadError::InvalidMetadata { .. })
    ));
}

#[test]
fn reader_detects_inconsistent_sizes() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    let block = bytes.len() - assets.metadata_footer.len() - METADATA_LEN;
    // Bump the stored kernel size by one alignment block.
    let kernel = u32::from_le_bytes(bytes[block + 4..block + 8].try_into().unwrap());
    bytes[block + 4..block + 8].copy_from_slice(&(kernel + 16).to_le_bytes());
    assert!(matches!(
        ImageReader::from_bytes(bytes, &assets),
        Err(ReadError::InconsistentLayout { .. })
    ));
}

#[test]
fn reader_rejects_short_input() {
    let assets = test_assets();
    match ImageReader::from_bytes(vec![0u8; 40], &assets) {
        Err(ReadError::TooShort { len, min }) => {
            assert_eq!(len, 40);
            assert_eq!(min, 32 + 24 + METADATA_LEN + 6);
        }
        Err(e) => panic!("expected too short, got {}", e),
        Ok(_) => panic!("expected too short"),
    }
}

#[test]
fn reader_sha256_is_stable() {
    let assets = test_assets();
    let bytes = build_image(&assets, &test_images()).unwrap().bytes;
    let a = ImageReader::from_bytes(bytes.clone(), &assets).unwrap();
    let b = ImageReader::from_bytes(bytes, &assets).unwrap();
    assert_eq!(a.sha256().len(), 64);
    assert_eq!(a.sha256(), b.sha256());
    assert_eq!(a.report().sections.len(), 4);
}

#[test]
fn reader_detects_template_change() {
    let assets = test_assets();
    let mut bytes = build_image(&assets, &test_images()).unwrap().bytes;
    let block = bytes.len() - assets.metadata_footer.len() - METADATA_LEN;
    let template = block - assets.metadata_header.len();
    bytes[block - 3] ^= 0xFF;
    match ImageReader::from_bytes(bytes, &assets) {
        Err(ReadError::TemplateMismatch { offset }) => assert_eq!(offset, template),
        Err(e) => panic!("expected template mismatch, got {}", e),
        Ok(_) => panic!("expected template mismatch"),
    }
}

/// Headers that are not 32 bytes are used as-is; the checksum still starts at offset 32.
#[test]
fn reader_accepts_odd_header_lengths() {
    for header_len in [31usize, 40] {
        let assets = StaticAssets {
            header: vec![0x11; header_len],
            ..test_assets()
        };
        let image = build_image(&assets, &test_images()).unwrap();
        let block = image.bytes.len() - assets.metadata_footer.len() - METADATA_LEN;
        assert_eq!(
            image.metadata.crc32_checksum,
            crc32fast::hash(&image.bytes[HEADER_LEN..block])
        );

        let reader = ImageReader::from_bytes(image.bytes.clone(), &assets).unwrap();
        assert_eq!(reader.metadata, image.metadata);
        assert_eq!(reader.sections()[0].offset, header_len as u64);
        assert!(reader.section(Section::Kernel).starts_with(b"kernel image"));
    }
}
