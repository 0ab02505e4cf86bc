//! Chunk identifier grammar: `chunk_<filename>_<chunk_index>`.
//!
//! The filename is embedded verbatim, so a name containing `_` followed by
//! digits parses ambiguously; `parse` resolves by splitting on the last
//! underscore. Components must agree on this rule.

/// Wire key for chunk `index` of `filename`.
pub fn format(filename: &str, index: u64) -> String {
    format!("chunk_{filename}_{index}")
}

/// Split a chunk identifier back into `(filename, index)`.
pub fn parse(chunk_id: &str) -> Option<(&str, u64)> {
    let rest = chunk_id.strip_prefix("chunk_")?;
    let (filename, index) = rest.rsplit_once('_')?;
    if filename.is_empty() {
        return None;
    }
    Some((filename, index.parse().ok()?))
}

/// Whether a storage-directory entry name is a chunk under this grammar.
pub fn conforms(name: &str) -> bool {
    parse(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_parse_round_trip() {
        let id = format("hello.bin", 7);
        assert_eq!(id, "chunk_hello.bin_7");
        assert_eq!(parse(&id), Some(("hello.bin", 7)));
    }

    #[test]
    fn rejects_non_chunk_names() {
        assert!(!conforms("hello.bin"));
        assert!(!conforms("chunk_"));
        assert!(!conforms("chunk_noindex"));
        assert!(!conforms("chunk_file_notanumber"));
    }

    #[test]
    fn underscore_filenames_split_on_last_underscore() {
        // "data_2" chunk 0 and "data" chunk 2 can still collide upstream;
        // the parse itself always takes the trailing integer as the index.
        assert_eq!(parse("chunk_data_2_0"), Some(("data_2", 0)));
        assert_eq!(parse("chunk_data_2"), Some(("data", 2)));
    }
}
