use exif::{Exif, In, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF attributes of the primary image
pub struct ExifReader(Exif);

impl ExifReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, exif::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Ok(Self(exif::Reader::new().read_from_container(&mut reader)?))
    }

    /// Display value of a primary-image tag, with units where EXIF defines them
    pub fn get_tag(&self, tag: Tag) -> Option<String> {
        self.0
            .get_field(tag, In::PRIMARY)
            .map(|field| clean(&field.display_value().with_unit(&self.0).to_string()))
    }

    /// All primary-image tags as raw `exif:<Tag>` keyed entries
    pub fn properties(&self) -> Vec<(String, String)> {
        self.0
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .map(|field| {
                (
                    format!("exif:{}", field.tag),
                    clean(&field.display_value().with_unit(&self.0).to_string()),
                )
            })
            .collect()
    }
}

/// Strip the quoting and stray newlines `display_value` leaves on ASCII values
fn clean(value: &str) -> String {
    value.replace(['\\', '"', '\n'], "").trim().to_string()
}
