//! Human-readable lookup and verification reports
//!
//! Shared by the `gol-lookup` and `gol` binaries. Everything writes to a
//! caller-supplied writer so the output can be asserted in tests.

use crate::config::CheckConfig;
use crate::import::PackReport;
use crate::storage::{
    Container, FeatureId, FeatureKey, FeatureStore, FeatureType, StoreOptions, StoreResult,
};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Default IDs for the `check` routine, all present in the Monaco extract
pub const MONACO_NODE: FeatureId = 4416197078;
pub const MONACO_WAY: FeatureId = 626967072;
pub const MONACO_RELATION: FeatureId = 2214022;

/// Tags shown per feature in the `check` summary lines
const PREVIEW_TAGS: usize = 3;

/// Phase timings of a single lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupTiming {
    pub open: Duration,
    pub lookup: Duration,
    pub read_tags: Duration,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Open `path`, look up `key` and print its tags followed by timings
///
/// Returns `Ok(false)` when the feature does not exist; the caller decides
/// the exit code.
pub fn lookup<W: Write>(
    path: &Path,
    key: FeatureKey,
    options: &StoreOptions,
    out: &mut W,
) -> StoreResult<bool> {
    let mut timing = LookupTiming::default();

    let start = Instant::now();
    let store = FeatureStore::open_with(path, options)?;
    timing.open = start.elapsed();

    let start = Instant::now();
    let feature = store.lookup_key(key)?;
    timing.lookup = start.elapsed();

    let feature = match feature {
        Some(feature) => feature,
        None => {
            writeln!(out, "{}: not found", key)?;
            return Ok(false);
        }
    };

    let start = Instant::now();
    let tags = feature.tags()?.to_vec()?;
    timing.read_tags = start.elapsed();

    writeln!(out, "{}:", key)?;
    for tag in &tags {
        writeln!(out, "  {}", tag)?;
    }

    writeln!(out)?;
    writeln!(out, "--- Timing ---")?;
    writeln!(out, "open GOL file:  {:7.2} ms", millis(timing.open))?;
    writeln!(out, "lookup by ID:   {:7.2} ms", millis(timing.lookup))?;
    writeln!(out, "read tags:      {:7.2} ms", millis(timing.read_tags))?;

    Ok(true)
}

/// IDs looked up by [`check`]; `None` skips that type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTargets {
    pub node: Option<FeatureId>,
    pub way: Option<FeatureId>,
    pub relation: Option<FeatureId>,
}

impl Default for CheckTargets {
    fn default() -> Self {
        Self {
            node: Some(MONACO_NODE),
            way: Some(MONACO_WAY),
            relation: Some(MONACO_RELATION),
        }
    }
}

impl CheckTargets {
    fn keys(&self) -> impl Iterator<Item = FeatureKey> {
        [
            self.node.map(FeatureKey::node),
            self.way.map(FeatureKey::way),
            self.relation.map(FeatureKey::relation),
        ]
        .into_iter()
        .flatten()
    }
}

/// Result counters of a [`check`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub found: usize,
    pub missing: usize,
    pub indexed: bool,
}

/// Verify lookups on both the found and not-found paths and time them
///
/// Prints a basic functionality section (first three tags of each target),
/// a repeated-lookup benchmark and a not-found benchmark over node IDs
/// `1..=N`. Iteration counts depend on whether an index is in use.
pub fn check<W: Write>(
    path: &Path,
    targets: CheckTargets,
    explicit_targets: bool,
    options: &StoreOptions,
    settings: &CheckConfig,
    out: &mut W,
) -> StoreResult<CheckSummary> {
    writeln!(out, "Loading: {}", path.display())?;
    let store = FeatureStore::open_with(path, options)?;
    writeln!(out, "✓ GOL loaded successfully")?;

    let index_dir = options.layout.index_dir(path);
    let indexed = store.has_index();
    if indexed {
        writeln!(out, "✓ ID index detected: {}", index_dir.display())?;
        writeln!(out, "  → Expecting O(log n) lookup performance")?;
    } else {
        writeln!(out, "⚠ No ID index found (looked for {})", index_dir.display())?;
        writeln!(out, "  → Using brute-force fallback (slower)")?;
    }

    if !explicit_targets {
        writeln!(out)?;
        writeln!(out, "--- Using Monaco default IDs ---")?;
        writeln!(
            out,
            "  node: {}, way: {}, relation: {}",
            MONACO_NODE, MONACO_WAY, MONACO_RELATION
        )?;
    }

    let mut summary = CheckSummary {
        indexed,
        ..CheckSummary::default()
    };

    writeln!(out)?;
    writeln!(out, "--- Basic Functionality Tests ---")?;
    for key in targets.keys() {
        let start = Instant::now();
        let feature = store.lookup_key(key)?;
        let elapsed = millis(start.elapsed());

        match feature {
            Some(feature) => {
                let preview = feature
                    .tags()?
                    .iter()
                    .take(PREVIEW_TAGS)
                    .map(|tag| tag.map(|t| format!("{}={}", t.key, t.value)))
                    .collect::<StoreResult<Vec<_>>>()?;
                writeln!(
                    out,
                    "✓ {}: found in {:.3}ms - {{{}}}",
                    key,
                    elapsed,
                    preview.join(", ")
                )?;
                summary.found += 1;
            }
            None => {
                writeln!(out, "✗ {}: not found ({:.3}ms)", key, elapsed)?;
                summary.missing += 1;
            }
        }
    }

    let iterations = settings.iterations(indexed).max(1);
    writeln!(out)?;
    writeln!(out, "--- Performance Benchmark ({} iterations) ---", iterations)?;
    for key in targets.keys() {
        let start = Instant::now();
        for _ in 0..iterations {
            store.lookup_key(key)?;
        }
        let elapsed = millis(start.elapsed());
        writeln!(
            out,
            "{}: {:.2}ms total, {:.3}ms avg per lookup",
            key,
            elapsed,
            elapsed / iterations as f64
        )?;
    }

    let not_found = settings.not_found_iterations(indexed).max(1);
    writeln!(out)?;
    writeln!(out, "--- Not-Found Performance ({} iterations) ---", not_found)?;
    let start = Instant::now();
    for fake_id in 1..=not_found {
        store.lookup(FeatureType::Node, fake_id)?;
    }
    let elapsed = millis(start.elapsed());
    writeln!(
        out,
        "{} not-found node lookups: {:.2}ms ({:.3}ms avg)",
        not_found,
        elapsed,
        elapsed / not_found as f64
    )?;

    writeln!(out)?;
    writeln!(out, "--- Summary ---")?;
    if indexed {
        writeln!(out, "✓ Using indexed lookup")?;
        writeln!(out, "  Expected: < 1ms per lookup")?;
    } else {
        writeln!(out, "⚠ Using brute-force fallback")?;
        writeln!(out, "  Expected: Variable (depends on dataset size)")?;
    }

    writeln!(out)?;
    writeln!(out, "✓ All tests completed!")?;

    tracing::debug!(
        found = summary.found,
        missing = summary.missing,
        indexed,
        "Check finished"
    );

    Ok(summary)
}

/// Print container header, per-type counts and index status
pub fn info<W: Write>(path: &Path, options: &StoreOptions, out: &mut W) -> StoreResult<()> {
    let store = FeatureStore::open_with(path, options)?;
    let header = store.container().header();

    writeln!(out, "Container: {}", path.display())?;
    writeln!(out, "  version:  {}", header.version)?;
    writeln!(out, "  checksum: {:08x}", header.checksum)?;
    writeln!(out, "  size:     {} bytes", store.container().len())?;
    writeln!(out)?;

    writeln!(out, "{:<10} {:>12} {:>12} {:>12}", "Type", "Count", "Offset", "Length")?;
    writeln!(out, "{}", "-".repeat(49))?;
    for &feature_type in FeatureType::all() {
        let region = header.region(feature_type);
        writeln!(
            out,
            "{:<10} {:>12} {:>12} {:>12}",
            feature_type.as_str(),
            region.count,
            region.offset,
            region.length
        )?;
    }
    writeln!(out)?;

    match store.index() {
        Some(index) => {
            writeln!(out, "ID index: {}", index.path().display())?;
            writeln!(out, "  entries: {}", index.header().total_entries())?;
        }
        None => writeln!(
            out,
            "ID index: none (looked for {})",
            options.layout.id_index_path(path).display()
        )?,
    }
    writeln!(out)?;
    writeln!(out, "{}", store.stats())?;

    Ok(())
}

/// Per-type counts after an index build
pub fn index_summary<W: Write>(container: &Container, index_path: &Path, out: &mut W) -> StoreResult<()> {
    writeln!(out, "Indexed {} features", container.total_records())?;
    for &feature_type in FeatureType::all() {
        writeln!(
            out,
            "  {:<10} {}",
            feature_type.as_str(),
            container.record_count(feature_type)
        )?;
    }
    writeln!(out, "Wrote {}", index_path.display())?;
    Ok(())
}

/// Outcome of a pack run, with a reminder when no index was built
pub fn pack_summary<W: Write>(report: &PackReport, out: &mut W) -> StoreResult<()> {
    writeln!(out, "Pack results:")?;
    writeln!(out, "  Features: {}", report.features)?;
    for &feature_type in FeatureType::all() {
        writeln!(
            out,
            "  {:<10} {}",
            feature_type.as_str(),
            report.header.region(feature_type).count
        )?;
    }
    writeln!(out, "  Container: {}", report.container_path.display())?;
    match &report.index_path {
        Some(path) => writeln!(out, "  Index: {}", path.display())?,
        None => {
            writeln!(out)?;
            writeln!(out, "No ID index built. Create one with:")?;
            writeln!(out, "  gol index {}", report.container_path.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, IndexLayout};
    use crate::storage::{Container, ContainerBuilder, IndexMode};
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn monaco_fixture(with_index: bool) -> (PathBuf, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monaco.gol");

        let mut builder = ContainerBuilder::new();
        builder
            .add(
                FeatureKey::node(MONACO_NODE),
                vec![],
                &[("amenity", "cafe"), ("name", "Café de Paris")],
            )
            .unwrap();
        builder
            .add(
                FeatureKey::way(MONACO_WAY),
                vec![],
                &[
                    ("building", "yes"),
                    ("name", "Stade Louis II"),
                    ("sport", "soccer"),
                    ("wikidata", "Q207215"),
                ],
            )
            .unwrap();
        builder
            .add(FeatureKey::relation(MONACO_RELATION), vec![], &[("type", "boundary")])
            .unwrap();
        builder.write(&path).unwrap();

        if with_index {
            let container = Container::open(&path).unwrap();
            build_index(&container, &IndexLayout::default()).unwrap();
        }

        (path, dir)
    }

    fn small_check() -> CheckConfig {
        CheckConfig {
            indexed_iterations: 5,
            scan_iterations: 2,
            not_found_indexed: 10,
            not_found_scan: 3,
        }
    }

    #[test]
    fn test_lookup_prints_tags() {
        let (path, _dir) = monaco_fixture(true);
        let mut out = Vec::new();

        let found = lookup(&path, FeatureKey::way(MONACO_WAY), &StoreOptions::default(), &mut out)
            .unwrap();
        assert!(found);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("way(626967072):\n  building = yes\n  name = Stade Louis II\n"));
        assert!(text.contains("--- Timing ---"));
        assert!(text.contains("lookup by ID:"));
    }

    #[test]
    fn test_lookup_not_found() {
        let (path, _dir) = monaco_fixture(false);
        let mut out = Vec::new();

        let found = lookup(&path, FeatureKey::node(1), &StoreOptions::default(), &mut out).unwrap();
        assert!(!found);
        assert_eq!(String::from_utf8(out).unwrap(), "node(1): not found\n");
    }

    #[test]
    fn test_check_defaults() {
        for with_index in [false, true] {
            let (path, _dir) = monaco_fixture(with_index);
            let mut out = Vec::new();

            let summary = check(
                &path,
                CheckTargets::default(),
                false,
                &StoreOptions::default(),
                &small_check(),
                &mut out,
            )
            .unwrap();

            assert_eq!(summary.found, 3);
            assert_eq!(summary.missing, 0);
            assert_eq!(summary.indexed, with_index);

            let text = String::from_utf8(out).unwrap();
            assert!(text.contains("--- Using Monaco default IDs ---"));
            // Only the first three tags are previewed
            assert!(text.contains("{building=yes, name=Stade Louis II, sport=soccer}"));
            assert!(!text.contains("wikidata"));
            let iterations = if with_index { 5 } else { 2 };
            assert!(text.contains(&format!("Performance Benchmark ({} iterations)", iterations)));
            assert!(text.contains("All tests completed!"));
        }
    }

    #[test]
    fn test_check_reports_missing_targets() {
        let (path, _dir) = monaco_fixture(true);
        let targets = CheckTargets {
            node: Some(42),
            way: None,
            relation: None,
        };
        let options = StoreOptions::new().index_mode(IndexMode::Disabled);
        let mut out = Vec::new();

        let summary = check(&path, targets, true, &options, &small_check(), &mut out).unwrap();
        assert_eq!(summary.found, 0);
        assert_eq!(summary.missing, 1);
        assert!(!summary.indexed);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("✗ node(42): not found"));
        assert!(!text.contains("Monaco default IDs"));
        assert!(text.contains("3 not-found node lookups"));
    }

    #[test]
    fn test_index_summary() {
        let (path, _dir) = monaco_fixture(false);
        let container = Container::open(&path).unwrap();
        let index_path = build_index(&container, &IndexLayout::default()).unwrap();
        let mut out = Vec::new();

        index_summary(&container, &index_path, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Indexed 3 features\n"));
        assert!(text.contains("  way        1\n"));
        assert!(text.ends_with("ids.idx\n"));
    }

    #[test]
    fn test_pack_summary_suggests_index() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("monaco.jsonl");
        let target = dir.path().join("monaco.gol");
        std::fs::write(&source, "{\"type\":\"way\",\"id\":626967072}\n").unwrap();

        let packed = crate::import::pack(&source, &target, false, &IndexLayout::default()).unwrap();
        let mut out = Vec::new();
        pack_summary(&packed, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  Features: 1\n"));
        assert!(text.contains("No ID index built"));
        assert!(text.contains(&format!("gol index {}", target.display())));

        let packed = crate::import::pack(&source, &target, true, &IndexLayout::default()).unwrap();
        let mut out = Vec::new();
        pack_summary(&packed, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("  Index: "));
    }

    #[test]
    fn test_info() {
        let (path, _dir) = monaco_fixture(true);
        let mut out = Vec::new();

        info(&path, &StoreOptions::default(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("version:  1"));
        assert!(text.contains("ids.idx"));
        assert!(text.contains("entries: 3"));
        assert!(text.contains("Lookup: indexed"));
    }
}
