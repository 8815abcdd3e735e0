//! Bundle files: the encrypted table of contents followed by one sealed
//! record per descriptor, in descriptor order.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use shared::error::SharedError;
use shared::oath::{EncryptedRecord, PackedLayout, TableOfContents};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    toc: TableOfContents,
    records: Vec<EncryptedRecord>,
}

impl Bundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(layout: &PackedLayout, bytes: &[u8]) -> Result<Self, SharedError> {
        let Some(&count) = bytes.first() else {
            return Ok(Self::empty());
        };
        let count = usize::from(count);
        let toc_len = layout.toc_size(count);
        let expected = toc_len + count * layout.secure_record_size;
        if bytes.len() != expected {
            return Err(SharedError::Bundle(format!(
                "bundle holds {actual} bytes but {count} records need {expected}",
                actual = bytes.len()
            )));
        }

        let toc = TableOfContents::from_bytes(layout, bytes[..toc_len].to_vec())?;
        let records = bytes[toc_len..]
            .chunks_exact(layout.secure_record_size)
            .map(|chunk| EncryptedRecord::from_bytes(layout, chunk.to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { toc, records })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.toc.as_bytes().to_vec();
        for record in &self.records {
            bytes.extend_from_slice(record.as_bytes());
        }
        bytes
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn records(&self) -> &[EncryptedRecord] {
        &self.records
    }

    /// Adds a freshly sealed record together with the table that lists it.
    pub fn append(&mut self, toc: TableOfContents, record: EncryptedRecord) -> Result<(), SharedError> {
        if toc.descriptor_count() != self.records.len() + 1 {
            return Err(SharedError::Bundle(format!(
                "table lists {listed} records after adding one to {held}",
                listed = toc.descriptor_count(),
                held = self.records.len()
            )));
        }
        self.toc = toc;
        self.records.push(record);
        Ok(())
    }

    pub fn replace_record(&mut self, index: usize, record: EncryptedRecord) -> Result<(), SharedError> {
        let slot = self.records.get_mut(index).ok_or_else(|| {
            SharedError::Bundle(format!("bundle has no record at index {index}"))
        })?;
        *slot = record;
        Ok(())
    }
}

/// Handle on a bundle file, held for the whole run.
#[derive(Debug)]
pub struct BundleFile {
    path: PathBuf,
    file: File,
}

impl BundleFile {
    /// Creates a new bundle. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SharedError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(io_error("create bundle", path))?;
        debug!(path = %path.display(), "bundle created");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens an existing bundle for reading and rewriting.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SharedError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_error("open bundle", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes and deletes the file. Used for a bundle whose creating run failed.
    pub fn discard(self) -> Result<(), SharedError> {
        let Self { path, file } = self;
        drop(file);
        fs::remove_file(&path).map_err(io_error("remove bundle", &path))?;
        debug!(path = %path.display(), "unfinished bundle removed");
        Ok(())
    }

    pub fn load(&mut self, layout: &PackedLayout) -> Result<Bundle, SharedError> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut bytes))
            .map_err(io_error("read bundle", &self.path))?;
        let bundle = Bundle::parse(layout, &bytes)?;
        debug!(path = %self.path.display(), records = bundle.records().len(), "bundle loaded");
        Ok(bundle)
    }

    /// Replaces the file contents with `bundle` and syncs it to disk.
    pub fn store(&mut self, bundle: &Bundle) -> Result<(), SharedError> {
        let bytes = bundle.to_bytes();
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(&bytes))
            .and_then(|_| self.file.sync_all())
            .map_err(io_error("write bundle", &self.path))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "bundle written");
        Ok(())
    }
}

fn io_error(action: &'static str, path: &Path) -> impl Fn(io::Error) -> SharedError + use<> {
    let path = path.display().to_string();
    move |err| SharedError::Bundle(format!("{action} {path} failed: {err}"))
}
