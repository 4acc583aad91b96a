use std::io::{Cursor, Write};
use zip::write::FileOptions;

/// Build an in-memory ZIP from (path, content) pairs. Paths ending in `/`
/// become directory entries.
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, FileOptions::default()).unwrap();
            continue;
        }
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
