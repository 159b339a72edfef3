//! ZIP implementation of [`PayloadReader`].

use super::PayloadReader;
use crate::error::{ErrorExt, Result, StapleError};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// Walks the central directory of a ZIP archive in stored order.
pub struct ZipPayloadReader<R = BufReader<File>> {
    path: PathBuf,
    archive: ZipArchive<R>,
    cursor: Cursor,
}

impl ZipPayloadReader {
    /// Opens the archive at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).fs_context("opening archive", path)?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> ZipPayloadReader<R> {
    /// Wraps an already opened archive stream; `path` is only used in errors.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let archive = ZipArchive::new(reader).map_err(|source| StapleError::ArchiveRead {
            path: path.clone(),
            source,
        })?;
        log::debug!("Opened {} ({} entries)", path.display(), archive.len());
        Ok(Self {
            path,
            archive,
            cursor: Cursor::BeforeFirst,
        })
    }

    /// Total number of entries in the archive.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// True for an archive without entries.
    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

impl<R: Read + Seek> PayloadReader for ZipPayloadReader<R> {
    fn next_entry(&mut self) -> Result<Option<String>> {
        let next = match self.cursor {
            Cursor::BeforeFirst => 0,
            Cursor::At(index) => index + 1,
            Cursor::Exhausted => return Ok(None),
        };
        // Names come from the central directory; entry data is only touched by open_entry.
        let Some(name) = self.archive.name_for_index(next) else {
            self.cursor = Cursor::Exhausted;
            return Ok(None);
        };
        let name = name.to_string();
        self.cursor = Cursor::At(next);
        Ok(Some(name))
    }

    fn open_entry(&mut self) -> Result<Box<dyn Read + '_>> {
        let Cursor::At(index) = self.cursor else {
            return Err(StapleError::NoCurrentEntry);
        };
        let path = self.path.clone();
        let entry = self
            .archive
            .by_index(index)
            .map_err(|source| StapleError::ArchiveRead { path, source })?;
        Ok(Box::new(entry))
    }
}
