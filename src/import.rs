//! JSON-lines import
//!
//! Builds a container (and optionally its ID index) from a feature dump with
//! one JSON object per line:
//!
//! ```text
//! {"type":"way","id":626967072,"tags":[["building","yes"],["name","Stade Louis II"]]}
//! {"type":"node","id":4416197078,"tags":[["amenity","cafe"]],"geometry":[1,2,3]}
//! ```
//!
//! Tags are an ordered list of pairs so that order and duplicate keys
//! survive the round trip. `geometry` is optional and stored as-is.

use crate::index::{build_index, IndexLayout};
use crate::storage::{
    Container, ContainerBuilder, ContainerHeader, FeatureId, FeatureKey, FeatureType, StoreError,
    StoreResult,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One feature as it appears in the import source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFeature {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub id: FeatureId,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
    #[serde(default)]
    pub geometry: Vec<u8>,
}

impl SourceFeature {
    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(self.feature_type, self.id)
    }
}

/// Outcome of a pack run
#[derive(Debug)]
pub struct PackReport {
    pub features: usize,
    pub container_path: PathBuf,
    pub header: ContainerHeader,
    pub index_path: Option<PathBuf>,
}

/// Parse a JSON-lines feature dump; blank lines are skipped
pub fn read_jsonl<R: BufRead>(reader: R) -> StoreResult<Vec<SourceFeature>> {
    let mut features = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let feature: SourceFeature = serde_json::from_str(trimmed)
            .map_err(|e| StoreError::Serialization(format!("line {}: {}", line_no + 1, e)))?;
        features.push(feature);
    }

    Ok(features)
}

/// Build a container at `out` from the JSON-lines file at `source`
pub fn pack(
    source: &Path,
    out: &Path,
    with_index: bool,
    layout: &IndexLayout,
) -> StoreResult<PackReport> {
    let features = read_jsonl(BufReader::new(File::open(source)?))?;

    let mut builder = ContainerBuilder::new();
    for feature in &features {
        let tags: Vec<(&str, &str)> = feature
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        builder.add(feature.key(), feature.geometry.clone(), &tags)?;
    }

    let header = builder.write(out)?;

    let index_path = if with_index {
        let container = Container::open(out)?;
        Some(build_index(&container, layout)?)
    } else {
        None
    };

    tracing::info!(
        source = %source.display(),
        features = features.len(),
        indexed = with_index,
        "Packed container"
    );

    Ok(PackReport {
        features: features.len(),
        container_path: out.to_path_buf(),
        header,
        index_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FeatureStore;
    use std::io::Cursor;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
{"type":"node","id":4416197078,"tags":[["amenity","cafe"],["name","Café de Paris"]]}

{"type":"way","id":626967072,"tags":[["building","yes"],["note","a"],["note","b"]],"geometry":[1,2,3]}
{"type":"relation","id":2214022}
"#;

    #[test]
    fn test_read_jsonl() {
        let features = read_jsonl(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0].key(), FeatureKey::node(4416197078));
        assert_eq!(features[1].tags.len(), 3);
        assert_eq!(features[1].geometry, vec![1, 2, 3]);
        assert!(features[2].tags.is_empty());
    }

    #[test]
    fn test_read_jsonl_reports_line() {
        let input = "{\"type\":\"way\",\"id\":1}\n{\"type\":\"area\",\"id\":2}\n";
        let err = read_jsonl(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_pack_with_index() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("monaco.jsonl");
        let out = dir.path().join("monaco.gol");
        std::fs::write(&source, SAMPLE).unwrap();

        let report = pack(&source, &out, true, &IndexLayout::default()).unwrap();
        assert_eq!(report.features, 3);
        assert_eq!(
            report.index_path,
            Some(dir.path().join("monaco-indexes").join("ids.idx"))
        );

        let store = FeatureStore::open(&out).unwrap();
        assert!(store.has_index());

        let way = store.way(626967072).unwrap().unwrap();
        let tags: Vec<_> = way
            .tags()
            .unwrap()
            .iter()
            .map(|t| t.unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["building = yes", "note = a", "note = b"]);
        assert_eq!(way.geometry(), &[1, 2, 3]);
    }

    #[test]
    fn test_pack_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("dup.jsonl");
        std::fs::write(&source, "{\"type\":\"way\",\"id\":1}\n{\"type\":\"way\",\"id\":1}\n").unwrap();

        let err = pack(&source, &dir.path().join("dup.gol"), false, &IndexLayout::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFeature(_)));
    }
}
