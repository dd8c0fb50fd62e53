#![no_main]

use fwimage::{ImageReader, StaticAssets};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let assets = StaticAssets {
        header: vec![0u8; 32],
        uboot: vec![0xCC; 16],
        metadata_header: b"MHDR".to_vec(),
        metadata_footer: b"MFTR".to_vec(),
    };
    if let Ok(reader) = ImageReader::from_bytes(data.to_vec(), &assets) {
        for span in reader.sections() {
            let _ = reader.section(span.section);
        }
    }
});
