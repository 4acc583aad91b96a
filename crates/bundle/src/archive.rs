use crate::error::{BundleError, Result};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use zip::ZipArchive;

/// One entry of an uploaded archive. Content is read on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_dir: bool,
    /// Uncompressed size as declared by the archive
    pub size: u64,
    index: usize,
}

/// A diagnostic bundle archive held in memory.
///
/// Cloning is cheap: the raw bytes and the parsed central directory are
/// shared, so a clone can be handed to the deferred secondary pass.
#[derive(Clone)]
pub struct BundleArchive {
    zip: ZipArchive<Cursor<Arc<[u8]>>>,
    entries: Vec<ArchiveEntry>,
    max_entry_bytes: u64,
}

impl std::fmt::Debug for BundleArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleArchive")
            .field("entries", &self.entries.len())
            .field("max_entry_bytes", &self.max_entry_bytes)
            .finish()
    }
}

impl BundleArchive {
    /// Open an archive from raw bytes.
    ///
    /// Fails with [`BundleError::ArchiveCorrupt`] when the bytes are not a
    /// valid ZIP container. Individual entries are not decompressed here.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| BundleError::corrupt(err.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|err| BundleError::corrupt(err.to_string()))?;
            entries.push(ArchiveEntry {
                path: file.name().to_string(),
                is_dir: file.is_dir(),
                size: file.size(),
                index,
            });
        }

        log::debug!("Opened archive with {} entries", entries.len());
        Ok(Self {
            zip,
            entries,
            max_entry_bytes: u64::MAX,
        })
    }

    /// Read an archive from disk
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Refuse to decompress entries larger than `limit` bytes
    pub fn with_entry_limit(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }

    /// All entries in archive order, directories included
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Entries that are regular files
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|entry| !entry.is_dir)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decompress one entry and decode it as UTF-8 text
    pub fn read_text(&mut self, entry: &ArchiveEntry) -> Result<String> {
        if entry.size > self.max_entry_bytes {
            return Err(BundleError::EntryTooLarge {
                path: entry.path.clone(),
                size: entry.size,
                limit: self.max_entry_bytes,
            });
        }

        let file = self
            .zip
            .by_index(entry.index)
            .map_err(|err| BundleError::entry_read(&entry.path, err))?;

        // The declared size can lie; never read more than the limit allows.
        let mut buf = Vec::with_capacity(entry.size.min(self.max_entry_bytes) as usize);
        file.take(self.max_entry_bytes.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|err| BundleError::entry_read(&entry.path, err))?;
        if buf.len() as u64 > self.max_entry_bytes {
            return Err(BundleError::EntryTooLarge {
                path: entry.path.clone(),
                size: buf.len() as u64,
                limit: self.max_entry_bytes,
            });
        }

        String::from_utf8(buf).map_err(|err| BundleError::entry_read(&entry.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("bundle/", FileOptions::default()).unwrap();
        for (name, content) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let err = BundleArchive::from_bytes(b"definitely not a zip".to_vec()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn lists_entries_in_archive_order() {
        let bytes = build_zip(&[("bundle/b.json", b"{}"), ("bundle/a.json", b"[]")]);
        let archive = BundleArchive::from_bytes(bytes).unwrap();
        let paths: Vec<_> = archive.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["bundle/", "bundle/b.json", "bundle/a.json"]);
        assert!(archive.entries()[0].is_dir);
        assert_eq!(archive.files().count(), 2);
    }

    #[test]
    fn reads_entry_text_lazily() {
        let bytes = build_zip(&[("bundle/version.json", br#"{"name":"node-1"}"#)]);
        let mut archive = BundleArchive::from_bytes(bytes).unwrap();
        let entry = archive.files().next().unwrap().clone();
        assert_eq!(archive.read_text(&entry).unwrap(), r#"{"name":"node-1"}"#);
    }

    #[test]
    fn invalid_utf8_is_an_entry_error() {
        let bytes = build_zip(&[("bundle/bad.json", &[0xff, 0xfe, 0x00])]);
        let mut archive = BundleArchive::from_bytes(bytes).unwrap();
        let entry = archive.files().next().unwrap().clone();
        let err = archive.read_text(&entry).unwrap_err();
        assert!(matches!(err, BundleError::EntryRead { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn entry_limit_is_enforced() {
        let bytes = build_zip(&[("bundle/big.json", &[b' '; 64])]);
        let mut archive = BundleArchive::from_bytes(bytes).unwrap().with_entry_limit(16);
        let entry = archive.files().next().unwrap().clone();
        assert!(matches!(
            archive.read_text(&entry),
            Err(BundleError::EntryTooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn clones_read_independently() {
        let bytes = build_zip(&[("bundle/aliases.json", b"{}")]);
        let archive = BundleArchive::from_bytes(bytes).unwrap();
        let mut first = archive.clone();
        let mut second = archive;
        let entry = first.files().next().unwrap().clone();
        assert_eq!(first.read_text(&entry).unwrap(), "{}");
        assert_eq!(second.read_text(&entry).unwrap(), "{}");
    }
}
