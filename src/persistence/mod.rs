//! Persistence codec
//!
//! One logical attribute maps to a family of up to four files sharing a
//! validated header:
//! - `dat` - values, fixed width or length-prefixed strings, or u32
//!   dictionary indices when enumerated
//! - `idx` - u32 cumulative offsets, one per document plus a trailing one
//!   (multi-value only)
//! - `weight` - i32 weights parallel to `dat` (weighted set only)
//! - `udat` - sorted unique values backing the indices (enumerated only)
//!
//! Saves always rewrite the whole family under a fresh save id.

mod header;
mod reader;
mod target;
mod writer;

pub use header::{FileHeader, FileKind, FORMAT_VERSION, HEADER_LEN, MAGIC};
pub use reader::{load_column, read_headers, DecodedColumn};
pub use target::{
    family_path, BufferWriter, FileLoadSource, FileSaveTarget, LoadSource, MemorySaveTarget,
    SaveTarget,
};
pub use writer::SaveSummary;

pub(crate) use writer::{estimated_save_bytes, save_column, SaveRequest};
