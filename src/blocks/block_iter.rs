use super::block::{Block, BlockType};
use crate::common::{UNCOMPRESSED_FLAG, WORD_SIZE};
use crate::errors::Section;
use crate::frame::FrameDescriptor;
use crate::io::{Error, ErrorKind, Read, Seek, SeekFrom};
use core::fmt;
use std::error::Error as StdError;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanError {
    /// The input ended inside a block or inside the content checksum.
    ///
    /// `offset` is the first size word boundary that could not be fully read: the offset of the
    /// size word itself if that was cut, or the offset where the next size word would have
    /// started if the body or the block checksum was cut. For the content checksum it is the
    /// offset of the checksum.
    UnexpectedEndOfInput { offset: u64, section: Section },
    Io { offset: u64, kind: ErrorKind },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::UnexpectedEndOfInput { offset, section } => write!(
                f,
                "Input ended while reading the {section}, next boundary at offset {offset} is unreachable"
            ),
            ScanError::Io { offset, kind } => {
                write!(f, "Error while reading the source at offset {offset}: {kind}")
            }
        }
    }
}

impl StdError for ScanError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Scanning,
    EndMark { offset: u64 },
    Failed,
}

/// Walks the block sequence of a frame without reading the block bodies.
///
/// Bodies are skipped with [`Seek`], only the size words and block checksums are read. The
/// iterator yields each [`Block`] in file order and ends after consuming the end mark. If the
/// input is cut short it yields one error and ends.
///
/// # Examples
/// ```
/// use lz4scan::{read_frame_header, BlockIter};
/// use std::io::Cursor;
///
/// let frame: &[u8] = &[
///     0x04, 0x22, 0x4D, 0x18, 0x60, 0x40, 0x82,
///     0x02, 0x00, 0x00, 0x80, b'h', b'i',
///     0x00, 0x00, 0x00, 0x00,
/// ];
/// let mut source = Cursor::new(frame);
/// let (header, _) = read_frame_header(&mut source).unwrap();
/// let blocks: Result<Vec<_>, _> = BlockIter::new(source, header.descriptor).unwrap().collect();
/// let blocks = blocks.unwrap();
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].declared_size, 2);
/// assert!(blocks[0].is_uncompressed());
/// ```
pub struct BlockIter<R: Read + Seek> {
    source: R,
    descriptor: FrameDescriptor,
    offset: u64,
    input_len: u64,
    next_index: usize,
    state: IterState,
}

impl<R: Read + Seek> BlockIter<R> {
    /// Start scanning at the current position of `source`, which must be right after the header.
    pub fn new(mut source: R, descriptor: FrameDescriptor) -> Result<Self, ScanError> {
        let offset = source
            .stream_position()
            .map_err(|e| ScanError::Io { offset: 0, kind: e.kind() })?;
        let input_len = source
            .seek(SeekFrom::End(0))
            .map_err(|e| ScanError::Io { offset, kind: e.kind() })?;
        source
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ScanError::Io { offset, kind: e.kind() })?;
        Ok(BlockIter {
            source,
            descriptor,
            offset,
            input_len,
            next_index: 0,
            state: IterState::Scanning,
        })
    }

    /// The offset of the next unread byte. After the end mark (and the content checksum, if
    /// read) this is where the frame ends.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn input_len(&self) -> u64 {
        self.input_len
    }

    /// How many blocks have been produced so far
    pub fn blocks_found(&self) -> usize {
        self.next_index
    }

    pub fn end_mark_offset(&self) -> Option<u64> {
        match self.state {
            IterState::EndMark { offset } => Some(offset),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state != IterState::Scanning
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read the content checksum following the end mark.
    ///
    /// Returns `Ok(None)` if the frame does not carry one, or if the end mark has not been
    /// reached yet. Calling this more than once reads past the checksum.
    pub fn read_content_checksum(&mut self) -> Result<Option<u32>, ScanError> {
        if !self.descriptor.content_checksum_flag() || self.end_mark_offset().is_none() {
            return Ok(None);
        }
        let offset = self.offset;
        if self.input_len.saturating_sub(offset) < WORD_SIZE {
            return Err(ScanError::UnexpectedEndOfInput {
                offset,
                section: Section::ContentChecksum,
            });
        }
        let checksum = self.read_word(offset)?;
        self.offset += WORD_SIZE;
        Ok(Some(checksum))
    }

    fn read_word(&mut self, offset: u64) -> Result<u32, ScanError> {
        let mut buf = [0u8; 4];
        self.source.read_exact(&mut buf).map_err(|e: Error| ScanError::Io {
            offset,
            kind: e.kind(),
        })?;
        Ok(u32::from_le_bytes(buf))
    }

    fn next_block(&mut self) -> Result<Option<Block>, ScanError> {
        let index = self.next_index;
        let file_offset = self.offset;

        if self.input_len.saturating_sub(file_offset) < WORD_SIZE {
            return Err(ScanError::UnexpectedEndOfInput {
                offset: file_offset,
                section: Section::BlockSize { index },
            });
        }
        let word = self.read_word(file_offset)?;
        if word == 0 {
            log_debug!("end mark at offset {}", file_offset);
            self.offset += WORD_SIZE;
            self.state = IterState::EndMark {
                offset: file_offset,
            };
            return Ok(None);
        }

        let block_type = if word & UNCOMPRESSED_FLAG != 0 {
            BlockType::Uncompressed
        } else {
            BlockType::Compressed
        };
        let declared_size = word & !UNCOMPRESSED_FLAG;
        let data_offset = file_offset + WORD_SIZE;
        let data_end = data_offset + u64::from(declared_size);
        let checksum_len = self.descriptor.block_checksum_bytes();
        let next_offset = data_end + checksum_len;

        if data_end > self.input_len {
            return Err(ScanError::UnexpectedEndOfInput {
                offset: next_offset,
                section: Section::BlockBody { index },
            });
        }
        self.source
            .seek(SeekFrom::Start(data_end))
            .map_err(|e| ScanError::Io {
                offset: data_offset,
                kind: e.kind(),
            })?;

        let checksum = if self.descriptor.block_checksum_flag() {
            if next_offset > self.input_len {
                return Err(ScanError::UnexpectedEndOfInput {
                    offset: next_offset,
                    section: Section::BlockChecksum { index },
                });
            }
            Some(self.read_word(data_end)?)
        } else {
            None
        };

        log_debug!(
            "block {}: {} bytes {} at offset {}",
            index,
            declared_size,
            block_type,
            file_offset
        );

        self.offset = next_offset;
        self.next_index += 1;
        Ok(Some(Block {
            index,
            file_offset,
            declared_size,
            block_type,
            data_offset,
            checksum,
        }))
    }
}

impl<R: Read + Seek> Iterator for BlockIter<R> {
    type Item = Result<Block, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != IterState::Scanning {
            return None;
        }
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(e) => {
                self.state = IterState::Failed;
                Some(Err(e))
            }
        }
    }
}
