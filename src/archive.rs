//! Packs named byte buffers into a single zip archive and unpacks archives
//! with random access by entry name.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArkivError;

/// Pack a set of named entries into one archive. Every entry is written
/// from the start of its buffer; content round-trips exactly through
/// [`unpack`].
pub fn pack(entries: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, ArkivError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, data) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Unpack an archive into memory. Entries are addressable by name; no
/// sequential access is required of callers.
pub fn unpack(data: &[u8]) -> Result<UnpackedArchive, ArkivError> {
    let mut zip = ZipArchive::new(Cursor::new(data))?;
    let mut entries = BTreeMap::new();

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;
        entries.insert(file.name().to_string(), content);
    }

    Ok(UnpackedArchive { entries })
}

/// Randomly accessible collection of named entries read from one archive.
#[derive(Debug, Default)]
pub struct UnpackedArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl UnpackedArchive {
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(|e| e.as_slice())
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|n| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> BTreeMap<String, Vec<u8>> {
        let mut entries = BTreeMap::new();
        entries.insert("record.json".to_string(), br#"{"id":1}"#.to_vec());
        entries.insert("scan.pdf".to_string(), vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xff]);
        entries.insert("scan.pdf.metadata".to_string(), br#"{"size":6}"#.to_vec());
        entries
    }

    #[test]
    fn pack_unpack_preserves_names_and_bytes() {
        let entries = sample_entries();
        let archive = pack(&entries).unwrap();
        let unpacked = unpack(&archive).unwrap();

        assert_eq!(unpacked.len(), entries.len());
        for (name, data) in &entries {
            assert_eq!(unpacked.entry(name), Some(data.as_slice()));
        }
    }

    #[test]
    fn entries_are_addressable_by_name_in_any_order() {
        let archive = pack(&sample_entries()).unwrap();
        let unpacked = unpack(&archive).unwrap();

        assert_eq!(unpacked.entry("scan.pdf.metadata"), Some(br#"{"size":6}"#.as_slice()));
        assert_eq!(unpacked.entry("record.json"), Some(br#"{"id":1}"#.as_slice()));
        assert_eq!(unpacked.entry("missing.bin"), None);
    }

    #[test]
    fn empty_entry_content_survives() {
        let mut entries = BTreeMap::new();
        entries.insert("empty.bin".to_string(), Vec::new());
        let unpacked = unpack(&pack(&entries).unwrap()).unwrap();
        assert_eq!(unpacked.entry("empty.bin"), Some(&[][..]));
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(unpack(b"not an archive").is_err());
    }
}
