use crate::blocks::block::Block;
use crate::checksum;
use crate::common::{FRAME_VERSION, MAGIC_NUM, MAX_HEADER_SIZE, SKIPPABLE_MAGIC_RANGE};
use crate::errors::Section;
use crate::io::{Error, ErrorKind, Read};
use core::fmt;
use std::error::Error as StdError;

/// The FLG and BD bytes of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    flg: u8,
    bd: u8,
}

/// The maximum size of a block's decompressed content, selected by bits 4-6 of BD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMaxSize {
    Max64KiB,
    Max256KiB,
    Max1MiB,
    Max4MiB,
}

impl BlockMaxSize {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            4 => Some(BlockMaxSize::Max64KiB),
            5 => Some(BlockMaxSize::Max256KiB),
            6 => Some(BlockMaxSize::Max1MiB),
            7 => Some(BlockMaxSize::Max4MiB),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BlockMaxSize::Max64KiB => 4,
            BlockMaxSize::Max256KiB => 5,
            BlockMaxSize::Max1MiB => 6,
            BlockMaxSize::Max4MiB => 7,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            BlockMaxSize::Max64KiB => 64 * 1024,
            BlockMaxSize::Max256KiB => 256 * 1024,
            BlockMaxSize::Max1MiB => 1024 * 1024,
            BlockMaxSize::Max4MiB => 4 * 1024 * 1024,
        }
    }
}

impl fmt::Display for BlockMaxSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockMaxSize::Max64KiB => write!(f, "64KiB"),
            BlockMaxSize::Max256KiB => write!(f, "256KiB"),
            BlockMaxSize::Max1MiB => write!(f, "1MiB"),
            BlockMaxSize::Max4MiB => write!(f, "4MiB"),
        }
    }
}

impl FrameDescriptor {
    /// Checks the reserved bits, the version and the block max size code.
    pub fn new(flg: u8, bd: u8) -> Result<Self, ReadFrameHeaderError> {
        Self::check_flg(flg)?;
        Self::check_bd(bd)?;
        Ok(FrameDescriptor { flg, bd })
    }

    fn check_flg(flg: u8) -> Result<(), ReadFrameHeaderError> {
        let version = flg >> 6;
        if version != FRAME_VERSION {
            return Err(ReadFrameHeaderError::UnsupportedVersion { version });
        }
        if flg & 0b0000_0010 != 0 {
            return Err(ReadFrameHeaderError::ReservedBitsSet {
                section: Section::FrameDescriptor,
                value: flg,
            });
        }
        Ok(())
    }

    fn check_bd(bd: u8) -> Result<(), ReadFrameHeaderError> {
        if bd & 0b1000_1111 != 0 {
            return Err(ReadFrameHeaderError::ReservedBitsSet {
                section: Section::BlockDescriptor,
                value: bd,
            });
        }
        let code = (bd >> 4) & 0x7;
        if BlockMaxSize::from_code(code).is_none() {
            return Err(ReadFrameHeaderError::InvalidBlockMaxSize { code });
        }
        Ok(())
    }

    pub fn flg(&self) -> u8 {
        self.flg
    }

    pub fn bd(&self) -> u8 {
        self.bd
    }

    pub fn version(&self) -> u8 {
        self.flg >> 6
    }

    pub fn block_independence(&self) -> bool {
        ((self.flg >> 5) & 0x1) == 1
    }

    pub fn block_checksum_flag(&self) -> bool {
        ((self.flg >> 4) & 0x1) == 1
    }

    pub fn content_size_flag(&self) -> bool {
        ((self.flg >> 3) & 0x1) == 1
    }

    pub fn content_checksum_flag(&self) -> bool {
        ((self.flg >> 2) & 0x1) == 1
    }

    pub fn dict_id_flag(&self) -> bool {
        (self.flg & 0x1) == 1
    }

    pub fn block_max_size_code(&self) -> u8 {
        (self.bd >> 4) & 0x7
    }

    pub fn block_max_size(&self) -> BlockMaxSize {
        // Validated in `new`
        BlockMaxSize::from_code(self.block_max_size_code()).unwrap_or(BlockMaxSize::Max4MiB)
    }

    // Deriving info from the flags
    pub fn block_checksum_bytes(&self) -> u64 {
        if self.block_checksum_flag() {
            4
        } else {
            0
        }
    }

    pub fn content_size_bytes(&self) -> usize {
        if self.content_size_flag() {
            8
        } else {
            0
        }
    }

    pub fn dictionary_id_bytes(&self) -> usize {
        if self.dict_id_flag() {
            4
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub descriptor: FrameDescriptor,
    content_size: Option<u64>,
    dict_id: Option<u32>,
    header_checksum: u8,
    header_len: u8,
}

impl FrameHeader {
    /// The size of the decompressed content, if the encoder announced it.
    pub fn content_size(&self) -> Option<u64> {
        self.content_size
    }

    pub fn dictionary_id(&self) -> Option<u32> {
        self.dict_id
    }

    pub fn header_checksum(&self) -> u8 {
        self.header_checksum
    }

    /// Length of the header including the magic number. Blocks start at this offset.
    pub fn header_len(&self) -> u8 {
        self.header_len
    }

    pub fn max_block_size(&self) -> usize {
        self.descriptor.block_max_size().bytes()
    }
}

/// A scanned frame: its header, the blocks found in file order and the trailing checksum.
///
/// Built incrementally by the block scan and not changed after it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub blocks: Vec<Block>,
    pub content_checksum: Option<u32>,
    /// Offset right after the end mark and content checksum. `None` if the scan did not get there.
    pub end_offset: Option<u64>,
}

impl Frame {
    pub fn new(header: FrameHeader) -> Self {
        Frame {
            header,
            blocks: Vec::new(),
            content_checksum: None,
            end_offset: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.end_offset.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReadFrameHeaderError {
    /// The first four bytes are not the LZ4 magic number, or there are fewer than four bytes
    InvalidMagic { found: Option<u32> },
    SkippableFrame { magic: u32, size: u32 },
    UnsupportedVersion { version: u8 },
    ReservedBitsSet { section: Section, value: u8 },
    InvalidBlockMaxSize { code: u8 },
    HeaderChecksumMismatch { expected: u8, actual: u8 },
    /// `offset` is where the field that could not be read starts
    UnexpectedEndOfInput { offset: u64, section: Section },
    Io { offset: u64, kind: ErrorKind },
}

impl fmt::Display for ReadFrameHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFrameHeaderError::InvalidMagic { found: Some(magic) } => write!(
                f,
                "Read wrong magic number: 0x{magic:08X}, Should be: 0x{MAGIC_NUM:08X}"
            ),
            ReadFrameHeaderError::InvalidMagic { found: None } => {
                write!(f, "Input is too short to contain a magic number")
            }
            ReadFrameHeaderError::SkippableFrame { magic, size } => write!(
                f,
                "SkippableFrame encountered with MagicNumber 0x{magic:X} and length {size} bytes"
            ),
            ReadFrameHeaderError::UnsupportedVersion { version } => write!(
                f,
                "Unsupported frame version. Is: {version:02b}, Should be: {FRAME_VERSION:02b}"
            ),
            ReadFrameHeaderError::ReservedBitsSet { section, value } => {
                write!(f, "Reserved bits set in {section}: 0b{value:08b}")
            }
            ReadFrameHeaderError::InvalidBlockMaxSize { code } => write!(
                f,
                "Invalid block max size code. Is: {code}, Should be one of: 4, 5, 6, 7"
            ),
            ReadFrameHeaderError::HeaderChecksumMismatch { expected, actual } => write!(
                f,
                "Header checksum does not match. Stored: 0x{expected:02X}, Computed: 0x{actual:02X}"
            ),
            ReadFrameHeaderError::UnexpectedEndOfInput { offset, section } => {
                write!(f, "Input ended at offset {offset} while reading the {section}")
            }
            ReadFrameHeaderError::Io { offset, kind } => {
                write!(f, "Error while reading the header at offset {offset}: {kind}")
            }
        }
    }
}

impl StdError for ReadFrameHeaderError {}

fn read_field(
    r: &mut impl Read,
    buf: &mut [u8],
    offset: u64,
    section: Section,
) -> Result<(), ReadFrameHeaderError> {
    r.read_exact(buf).map_err(|e: Error| match e.kind() {
        ErrorKind::UnexpectedEof => ReadFrameHeaderError::UnexpectedEndOfInput { offset, section },
        kind => ReadFrameHeaderError::Io { offset, kind },
    })
}

/// Parse and validate a frame header, returning it together with its length in bytes.
///
/// On success the reader is positioned at the first block size word.
pub fn read_frame_header(mut r: impl Read) -> Result<(FrameHeader, u8), ReadFrameHeaderError> {
    use ReadFrameHeaderError as err;
    let mut buf = [0u8; 4];

    // Not even being able to read the magic number means this is not a frame
    if let Err(e) = r.read_exact(&mut buf) {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => err::InvalidMagic { found: None },
            kind => err::Io { offset: 0, kind },
        });
    }
    let magic_num = u32::from_le_bytes(buf);

    if SKIPPABLE_MAGIC_RANGE.contains(&magic_num) {
        read_field(&mut r, &mut buf, 4, Section::SkippableFrameSize)?;
        let size = u32::from_le_bytes(buf);
        return Err(err::SkippableFrame {
            magic: magic_num,
            size,
        });
    }

    if magic_num != MAGIC_NUM {
        return Err(err::InvalidMagic {
            found: Some(magic_num),
        });
    }

    // Everything after the magic number up to the last optional field is hashed
    let mut descriptor_bytes = [0u8; MAX_HEADER_SIZE - 5];
    let mut len = 0;

    read_field(
        &mut r,
        &mut descriptor_bytes[0..1],
        4,
        Section::FrameDescriptor,
    )?;
    // A broken FLG is reported as such, even if the input ends right after it
    FrameDescriptor::check_flg(descriptor_bytes[0])?;
    read_field(
        &mut r,
        &mut descriptor_bytes[1..2],
        5,
        Section::BlockDescriptor,
    )?;
    len += 2;
    let desc = FrameDescriptor::new(descriptor_bytes[0], descriptor_bytes[1])?;

    let mut content_size = None;
    let fcs_len = desc.content_size_bytes();
    if fcs_len != 0 {
        let fcs_buf = &mut descriptor_bytes[len..len + fcs_len];
        read_field(&mut r, fcs_buf, 4 + len as u64, Section::ContentSize)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(fcs_buf);
        content_size = Some(u64::from_le_bytes(raw));
        len += fcs_len;
    }

    let mut dict_id = None;
    let dict_id_len = desc.dictionary_id_bytes();
    if dict_id_len != 0 {
        let dict_buf = &mut descriptor_bytes[len..len + dict_id_len];
        read_field(&mut r, dict_buf, 4 + len as u64, Section::DictionaryId)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(dict_buf);
        dict_id = Some(u32::from_le_bytes(raw));
        len += dict_id_len;
    }

    read_field(
        &mut r,
        &mut buf[0..1],
        4 + len as u64,
        Section::HeaderChecksum,
    )?;
    let check = checksum::verify_header(&descriptor_bytes[..len], buf[0]);
    if !check.passed() {
        return Err(err::HeaderChecksumMismatch {
            expected: buf[0],
            actual: check.actual as u8,
        });
    }

    let header = FrameHeader {
        descriptor: desc,
        content_size,
        dict_id,
        header_checksum: buf[0],
        header_len: (4 + len + 1) as u8,
    };
    log_debug!(
        "frame header: flg=0x{:02X} bd=0x{:02X} content_size={:?} dict_id={:?}",
        desc.flg(),
        desc.bd(),
        header.content_size,
        header.dict_id
    );

    let header_len = header.header_len;
    Ok((header, header_len))
}
