//! Re-exports of the std io items used by the header parser and the block scan.
pub use std::io::{Cursor, Error, ErrorKind, Read, Seek, SeekFrom};
