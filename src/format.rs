//! Factory image layout types and constants.
//!
//! The image is `header | rootfs | kernel | uboot | backup kernel | metadata header |
//! metadata block | metadata footer`. Every variable section is zero padded so the
//! running image length lands on [`ALIGNMENT`]. All multi-byte fields are little-endian.

/// Section alignment in bytes.
pub const ALIGNMENT: usize = 16;

/// Length of the fixed image header. The checksum skips exactly this many bytes.
pub const HEADER_LEN: usize = 32;

/// Serialized size of [`Metadata`]: eleven little-endian words.
pub const METADATA_LEN: usize = 44;

/// Constant word following the reserved fields.
pub const METADATA_MARKER: u32 = 0x0000_0007;

/// Constant word following the backup kernel size.
pub const METADATA_FLAGS: u32 = 0x0000_0002;

/// Trailing constant word of the metadata block (1392).
pub const METADATA_TRAILER: u32 = 0x0000_0570;

/// Added to the padded backup kernel length when it is stored.
pub const BACKUP_KERNEL_ADJUST: u32 = 40;

/// Number of zeroed reserved words.
const RESERVED_WORDS: usize = 3;

/// One of the four variable-length sections, in image order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Section {
    Rootfs,
    Kernel,
    Uboot,
    Ramdisk,
}

impl Section {
    /// Sections in the order they are appended.
    pub const ALL: [Section; 4] = [
        Section::Rootfs,
        Section::Kernel,
        Section::Uboot,
        Section::Ramdisk,
    ];

    /// Name used in the console size report.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Section::Rootfs => "Rootfs",
            Section::Kernel => "Kernel",
            Section::Uboot => "Uboot",
            Section::Ramdisk => "Ramdisk",
        }
    }
}

/// Padded lengths of the four sections, as recorded in the metadata block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SectionSizes {
    pub rootfs: u32,
    pub kernel: u32,
    pub uboot: u32,
    pub ramdisk: u32,
}

impl SectionSizes {
    #[must_use]
    pub fn get(&self, section: Section) -> u32 {
        match section {
            Section::Rootfs => self.rootfs,
            Section::Kernel => self.kernel,
            Section::Uboot => self.uboot,
            Section::Ramdisk => self.ramdisk,
        }
    }

    /// Sum of all padded section lengths.
    #[must_use]
    pub fn total(&self) -> u64 {
        Section::ALL.iter().map(|&s| u64::from(self.get(s))).sum()
    }

    /// `"<Name> size: <dec> / 0x<hex>"` lines in image order.
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        Section::ALL
            .iter()
            .map(|&s| {
                let size = self.get(s);
                format!("{} size: {} / 0x{:x}", s.display_name(), size, size)
            })
            .collect()
    }
}

/// The 44-byte metadata block consumed by the boot firmware.
///
/// `backup_kernel_size` holds the padded section length; the `+ 40` adjustment is
/// applied only on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Metadata {
    /// zlib CRC32 of the image from offset [`HEADER_LEN`] up to this block.
    pub crc32_checksum: u32,
    pub primary_kernel_size: u32,
    /// Also the offset of the kernel section relative to the end of the header.
    pub squashfs_size: u32,
    pub uboot_size: u32,
    pub backup_kernel_size: u32,
}

impl Metadata {
    #[must_use]
    pub fn new(crc32_checksum: u32, sizes: &SectionSizes) -> Self {
        Self {
            crc32_checksum,
            primary_kernel_size: sizes.kernel,
            squashfs_size: sizes.rootfs,
            uboot_size: sizes.uboot,
            backup_kernel_size: sizes.ramdisk,
        }
    }

    /// Section sizes described by this block.
    #[must_use]
    pub fn sizes(&self) -> SectionSizes {
        SectionSizes {
            rootfs: self.squashfs_size,
            kernel: self.primary_kernel_size,
            uboot: self.uboot_size,
            ramdisk: self.backup_kernel_size,
        }
    }

    /// Serialize the block. Returns `None` when the adjusted backup size overflows u32.
    #[must_use]
    pub fn to_bytes(&self) -> Option<[u8; METADATA_LEN]> {
        let backup = self.backup_kernel_size.checked_add(BACKUP_KERNEL_ADJUST)?;
        let mut words = [0u32; METADATA_LEN / 4];
        words[0] = self.crc32_checksum;
        words[1] = self.primary_kernel_size;
        words[2] = self.squashfs_size;
        words[3] = self.uboot_size;
        // words[4..7] are reserved and stay zero.
        words[4 + RESERVED_WORDS] = METADATA_MARKER;
        words[5 + RESERVED_WORDS] = backup;
        words[6 + RESERVED_WORDS] = METADATA_FLAGS;
        words[7 + RESERVED_WORDS] = METADATA_TRAILER;

        let mut out = [0u8; METADATA_LEN];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Some(out)
    }

    /// Parse a block. Returns `None` if the constant words do not match or the
    /// stored backup size is below the adjustment.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; METADATA_LEN]) -> Option<Self> {
        let word = |i: usize| {
            let mut w = [0u8; 4];
            w.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            u32::from_le_bytes(w)
        };
        let reserved_ok = (4..4 + RESERVED_WORDS).all(|i| word(i) == 0);
        if !reserved_ok
            || word(4 + RESERVED_WORDS) != METADATA_MARKER
            || word(6 + RESERVED_WORDS) != METADATA_FLAGS
            || word(7 + RESERVED_WORDS) != METADATA_TRAILER
        {
            return None;
        }
        Some(Self {
            crc32_checksum: word(0),
            primary_kernel_size: word(1),
            squashfs_size: word(2),
            uboot_size: word(3),
            backup_kernel_size: word(5 + RESERVED_WORDS).checked_sub(BACKUP_KERNEL_ADJUST)?,
        })
    }
}
