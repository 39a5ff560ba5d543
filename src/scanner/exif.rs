use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 撮影日時を取得（DateTimeOriginal → DateTime の順）
pub fn extract_date(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut bufreader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader).ok()?;

    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .iter()
        .find_map(|tag| exif.get_field(*tag, exif::In::PRIMARY))
        .map(|field| field.display_value().to_string())
}
