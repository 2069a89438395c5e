//! Namespace partitioning for embedded image tags
//!
//! Embedded tags arrive as one flat mapping keyed `<namespace>:<name>`
//! (`exif:Make`, `xmp:CreatorTool`, ...). [`partition_by_prefix`] splits such a
//! mapping into one map per requested prefix with the prefix stripped.

use std::collections::{BTreeMap, HashMap};

/// Split `entries` into one map per prefix, stripping the prefix from each key.
///
/// Every requested prefix is present in the result, possibly with an empty map.
/// Entries matching no prefix, or whose key is empty once stripped, are dropped.
/// When prefixes overlap the first matching prefix wins.
pub fn partition_by_prefix<'p, V, I>(
    entries: I,
    prefixes: &[&'p str],
) -> HashMap<&'p str, BTreeMap<String, V>>
where
    I: IntoIterator<Item = (String, V)>,
{
    let mut partitions: HashMap<&'p str, BTreeMap<String, V>> = prefixes
        .iter()
        .map(|prefix| (*prefix, BTreeMap::new()))
        .collect();

    for (key, value) in entries {
        let matched = prefixes
            .iter()
            .find_map(|prefix| key.strip_prefix(prefix).map(|rest| (*prefix, rest)));

        if let Some((prefix, rest)) = matched {
            if rest.is_empty() {
                continue;
            }
            if let Some(partition) = partitions.get_mut(prefix) {
                partition.insert(rest.to_string(), value);
            }
        }
    }

    partitions
}
