//! Embedded XMP packets.
//!
//! Packets are located by scanning the head of the file for the `x:xmpmeta`
//! envelope, so the same reader covers JPEG, PNG, TIFF and PSD containers.
//! Only simple properties are read: attributes on `rdf:Description`, simple
//! elements, and `rdf:Seq`/`rdf:Bag`/`rdf:Alt` lists (joined with ", ").

use regex::Regex;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;

const SCAN_LIMIT: u64 = 4 * 1024 * 1024;
const PACKET_START: &[u8] = b"<x:xmpmeta";
const PACKET_END: &[u8] = b"</x:xmpmeta>";

/// Namespaces that carry RDF structure rather than properties
const STRUCTURAL_PREFIXES: &[&str] = &["x", "rdf", "xml", "xmlns"];

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([A-Za-z][\w.-]*):([A-Za-z][\w.-]*)\s*=\s*"([^"]*)""#)
        .expect("valid attribute regex")
});

static SIMPLE_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<([A-Za-z][\w.-]*):([A-Za-z][\w.-]*)(?:\s[^>]*)?>([^<]*)</([A-Za-z][\w.-]*):([A-Za-z][\w.-]*)>",
    )
    .expect("valid element regex")
});

static LIST_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<([A-Za-z][\w.-]*):([A-Za-z][\w.-]*)(?:\s[^>]*)?>\s*<rdf:(?:Seq|Bag|Alt)>(.*?)</rdf:(?:Seq|Bag|Alt)>",
    )
    .expect("valid list regex")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<rdf:li(?:\s[^>]*)?>([^<]*)</rdf:li>").expect("valid list item regex")
});

/// Read the XMP properties of a file as raw `xmp:` keyed entries
pub fn read_properties(path: &Path) -> io::Result<Vec<(String, String)>> {
    let mut head = Vec::new();
    File::open(path)?.take(SCAN_LIMIT).read_to_end(&mut head)?;
    Ok(find_packet(&head)
        .map(parse_properties)
        .unwrap_or_default())
}

/// Locate the first XMP packet in `data`
pub fn find_packet(data: &[u8]) -> Option<&str> {
    let start = find(data, PACKET_START)?;
    let end = start + find(&data[start..], PACKET_END)? + PACKET_END.len();
    std::str::from_utf8(&data[start..end]).ok()
}

/// Raw key for a property: `xmp:Name` for the core namespace, `xmp:<prefix>:Name` otherwise
fn raw_key(prefix: &str, name: &str) -> Option<String> {
    if STRUCTURAL_PREFIXES.contains(&prefix) {
        return None;
    }
    if prefix == "xmp" {
        Some(format!("xmp:{}", name))
    } else {
        Some(format!("xmp:{}:{}", prefix, name))
    }
}

/// Extract simple properties from an XMP packet
pub fn parse_properties(packet: &str) -> Vec<(String, String)> {
    let mut properties = Vec::new();

    for caps in ATTRIBUTE.captures_iter(packet) {
        if let Some(key) = raw_key(&caps[1], &caps[2]) {
            properties.push((key, unescape(&caps[3])));
        }
    }

    for caps in SIMPLE_ELEMENT.captures_iter(packet) {
        if caps[1] != caps[4] || caps[2] != caps[5] {
            continue;
        }
        let value = caps[3].trim();
        if value.is_empty() {
            continue;
        }
        if let Some(key) = raw_key(&caps[1], &caps[2]) {
            properties.push((key, unescape(value)));
        }
    }

    for caps in LIST_ELEMENT.captures_iter(packet) {
        let Some(key) = raw_key(&caps[1], &caps[2]) else {
            continue;
        };
        let items: Vec<String> = LIST_ITEM
            .captures_iter(&caps[3])
            .map(|item| unescape(item[1].trim()))
            .filter(|item| !item.is_empty())
            .collect();
        if !items.is_empty() {
            properties.push((key, items.join(", ")));
        }
    }

    properties
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
pub(crate) const SAMPLE_PACKET: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:photoshop="http://ns.adobe.com/photoshop/1.0/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmp:CreatorTool="Adobe Photoshop CC 2019 (Macintosh)"
    xmp:CreateDate="2019-03-01T10:15:00-05:00"
    photoshop:ColorMode="3">
   <xmp:ModifyDate>2019-03-02T08:00:00-05:00</xmp:ModifyDate>
   <dc:creator>
    <rdf:Seq>
     <rdf:li>Jane Doe</rdf:li>
     <rdf:li>R&amp;D</rdf:li>
    </rdf:Seq>
   </dc:creator>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;
