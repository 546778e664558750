//! Archive handling for ODT and DOCX packages
//!
//! Both formats are ZIP archives of XML parts and resources. Entries keep
//! their order and compression method, so an archive that is read and
//! written back differs only in the parts that were replaced.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::Result;

/// OpenDocument media type entry; must come first and stay uncompressed
pub const MIMETYPE: &str = "mimetype";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// An unpacked document package
#[derive(Debug, Clone, Default)]
pub struct PackageArchive {
    entries: Vec<Entry>,
}

impl PackageArchive {
    /// Open and unpack a package file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }

        Ok(Self { entries })
    }

    /// Create from the bytes of a package file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(std::io::Cursor::new(bytes))
    }

    /// Get a file's contents by path
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == path)
            .map(|e| e.data.as_slice())
    }

    /// Check if a file exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.name == path)
    }

    /// List all files in archive order
    pub fn file_list(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Set or update a file's contents; new files are appended
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        let path = path.into();
        match self.entries.iter_mut().find(|e| e.name == path) {
            Some(entry) => entry.data = contents,
            None => {
                let compression = if path == MIMETYPE {
                    CompressionMethod::Stored
                } else {
                    CompressionMethod::Deflated
                };
                self.entries.push(Entry {
                    name: path,
                    data: contents,
                    compression,
                });
            }
        }
    }

    /// Write the archive to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    /// Write the archive to any writer
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        // OpenDocument readers sniff the first entry
        let mimetype = self.entries.iter().filter(|e| e.name == MIMETYPE);
        let rest = self.entries.iter().filter(|e| e.name != MIMETYPE);
        for entry in mimetype.chain(rest) {
            let compression = if entry.name == MIMETYPE {
                CompressionMethod::Stored
            } else {
                entry.compression
            };
            let options = SimpleFileOptions::default().compression_method(compression);
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the archive to a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_odt;

    #[test]
    fn test_file_operations() {
        let mut archive = PackageArchive::default();

        archive.set("content.xml", b"<root/>".to_vec());
        assert!(archive.contains("content.xml"));
        assert_eq!(archive.get("content.xml"), Some(&b"<root/>"[..]));

        archive.set("content.xml", b"<other/>".to_vec());
        assert_eq!(archive.file_list().count(), 1);
        assert_eq!(archive.get("content.xml"), Some(&b"<other/>"[..]));
        assert!(!archive.contains("styles.xml"));
    }

    #[test]
    fn test_roundtrip_preserves_order_and_mimetype() {
        let bytes = create_odt("<office:text/>", None);
        let archive = PackageArchive::from_bytes(&bytes).unwrap();
        let names: Vec<_> = archive.file_list().collect();
        assert_eq!(names[0], MIMETYPE);

        let written = archive.to_bytes().unwrap();
        let reread = PackageArchive::from_bytes(&written).unwrap();
        assert_eq!(reread.file_list().collect::<Vec<_>>(), names);
        assert_eq!(reread.get("content.xml"), archive.get("content.xml"));

        let mut zip = ZipArchive::new(std::io::Cursor::new(written)).unwrap();
        let first = zip.by_index(0).unwrap();
        assert_eq!(first.name(), MIMETYPE);
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_mimetype_moved_first() {
        let mut archive = PackageArchive::default();
        archive.set("content.xml", b"<a/>".to_vec());
        archive.set(MIMETYPE, b"application/vnd.oasis.opendocument.text".to_vec());

        let written = archive.to_bytes().unwrap();
        let mut zip = ZipArchive::new(std::io::Cursor::new(written)).unwrap();
        assert_eq!(zip.by_index(0).unwrap().name(), MIMETYPE);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.odt");

        let mut archive = PackageArchive::default();
        archive.set("content.xml", b"<a/>".to_vec());
        archive.write_to_file(&path).unwrap();

        let reopened = PackageArchive::open(&path).unwrap();
        assert_eq!(reopened.get("content.xml"), Some(&b"<a/>"[..]));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(PackageArchive::from_bytes(b"<xml/>").is_err());
    }
}
