//! Save targets and load sources.
//!
//! The encoder writes each file's payload through a `BufferWriter` obtained
//! from the target, then hands the finished headers to `finalize`, which
//! makes the whole family durable at once.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use uuid::Uuid;

use super::header::{FileHeader, FileKind};
use crate::attribute::{AttributeError, AttributeResult};

/// Buffered payload stream for one file, checksummed as it is written.
#[derive(Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
    hasher: Hasher,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf
    }
}

impl std::fmt::Debug for BufferWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferWriter")
            .field("len", &self.buf.len())
            .finish()
    }
}

pub trait SaveTarget {
    /// Stream for `kind`, created empty on first use.
    fn writer(&mut self, kind: FileKind) -> &mut BufferWriter;

    /// Persist every written stream behind its header. Kinds without a
    /// header are not part of the new family.
    fn finalize(&mut self, headers: &[FileHeader]) -> AttributeResult<()>;
}

pub trait LoadSource {
    /// Complete file contents for `kind`, or `None` if the family lacks it.
    fn read(&self, kind: FileKind) -> AttributeResult<Option<Vec<u8>>>;

    /// Name of the file for `kind`, used in errors.
    fn describe(&self, kind: FileKind) -> String;
}

fn assemble(header: &FileHeader, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(header.encode().len() + payload.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(payload);
    bytes
}

/// In-memory family. Also a load source, which makes it handy for tests and
/// for copying a column between instances.
#[derive(Debug, Default)]
pub struct MemorySaveTarget {
    pending: BTreeMap<FileKind, BufferWriter>,
    files: BTreeMap<FileKind, Vec<u8>>,
}

impl MemorySaveTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished file bytes for `kind`.
    pub fn file(&self, kind: FileKind) -> Option<&[u8]> {
        self.files.get(&kind).map(Vec::as_slice)
    }

    pub fn file_mut(&mut self, kind: FileKind) -> Option<&mut Vec<u8>> {
        self.files.get_mut(&kind)
    }

    pub fn kinds(&self) -> Vec<FileKind> {
        self.files.keys().copied().collect()
    }
}

impl SaveTarget for MemorySaveTarget {
    fn writer(&mut self, kind: FileKind) -> &mut BufferWriter {
        self.pending.entry(kind).or_default()
    }

    fn finalize(&mut self, headers: &[FileHeader]) -> AttributeResult<()> {
        let Some(first) = headers.first() else {
            return Ok(());
        };
        let save_id = first.save_id;
        let mut pending = std::mem::take(&mut self.pending);
        let mut written: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(headers.len());

        for header in headers {
            let payload = pending.remove(&header.kind).unwrap_or_default();
            let tmp = self.tmp_path(header);
            if let Err(e) = Self::write_tmp(&tmp, &assemble(header, payload.payload())) {
                // Only remove temporaries this call created
                if !matches!(e.kind(), io::ErrorKind::AlreadyExists) {
                    let _ = fs::remove_file(&tmp);
                }
                remove_all(written.iter().map(|(tmp, _)| tmp));
                return Err(AttributeError::io(tmp.display().to_string(), e));
            }
            written.push((tmp, family_path(&self.base, header.kind)));
        }

        // Every regular file of the previous family is moved aside first so
        // it can be put back if any rename below fails.
        let mut aside: Vec<(PathBuf, PathBuf)> = Vec::new();
        for kind in FileKind::ALL {
            let current = family_path(&self.base, kind);
            let is_file = fs::symlink_metadata(&current).map_or(false, |m| m.is_file());
            if !is_file {
                continue;
            }
            let backup = aside_path(&current, &save_id);
            if let Err(e) = fs::rename(&current, &backup) {
                restore(&aside);
                remove_all(written.iter().map(|(tmp, _)| tmp));
                return Err(AttributeError::io(current.display().to_string(), e));
            }
            aside.push((backup, current));
        }

        for (i, (tmp, target)) in written.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, target) {
                remove_all(written[..i].iter().map(|(_, target)| target));
                remove_all(written[i..].iter().map(|(tmp, _)| tmp));
                restore(&aside);
                return Err(AttributeError::io(target.display().to_string(), e));
            }
        }

        let parent = self.base.parent().unwrap_or_else(|| Path::new("."));
        fsync_dir(parent).map_err(|e| AttributeError::io(parent.display().to_string(), e))?;

        // The new family is in place; the old one, including suffixes the new
        // layout lacks, is only backups now
        for (backup, _) in &aside {
            match fs::remove_file(backup) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(AttributeError::io(backup.display().to_string(), e)),
            }
        }
        Ok(())
    }
}

fn aside_path(path: &Path, save_id: &Uuid) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.old", save_id.simple()));
    PathBuf::from(name)
}

fn remove_all<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Put moved-aside files back under their final names.
fn restore(aside: &[(PathBuf, PathBuf)]) {
    for (backup, original) in aside {
        let _ = fs::rename(backup, original);
    }
}

/// Reads a family from disk by base name.
#[derive(Debug, Clone)]
pub struct FileLoadSource {
    base: PathBuf,
}

impl FileLoadSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl LoadSource for FileLoadSource {
    fn read(&self, kind: FileKind) -> AttributeResult<Option<Vec<u8>>> {
        let path = family_path(&self.base, kind);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AttributeError::io(path.display().to_string(), e)),
        }
    }

    fn describe(&self, kind: FileKind) -> String {
        family_path(&self.base, kind).display().to_string()
    }
}
