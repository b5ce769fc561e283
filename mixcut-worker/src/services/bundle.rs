//! Zip archive of a job's outputs

use std::io::{Cursor, Write};

use mixcut_common::{Error, Result};

/// Name of the archive stored next to the cut tracks
pub const BUNDLE_FILE_NAME: &str = "bundle.zip";

/// Build a zip archive in memory from `(entry name, contents)` pairs
///
/// Entries are written in the order given.
pub fn build_bundle(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, body) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|err| Error::Archive(err.to_string()))?;
        zip.write_all(body)?;
    }

    let cursor = zip.finish().map_err(|err| Error::Archive(err.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_bundle_contains_every_entry() {
        let entries = vec![
            ("01 First.m4a".to_string(), b"first".to_vec()),
            ("02 Second.m4a".to_string(), b"second".to_vec()),
        ];
        let bytes = build_bundle(&entries).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut body = String::new();
        archive
            .by_name("02 Second.m4a")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "second");
    }
}
