//! Raw sample conversion and caching.
//!
//! A source is read once into a [`RawSample`] and cached as bincode. Later
//! stages reload the cache; a missing or unreadable cache is rebuilt from
//! the source.

use crate::error::Result;
use crate::jet::JetRecord;
use crate::serialization::{load_bincode, save_bincode};
use crate::source::JetSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// All jets of one input sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub name: String,
    pub jets: Vec<JetRecord>,
}

impl RawSample {
    pub fn len(&self) -> usize {
        self.jets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jets.is_empty()
    }
}

/// Reads `source` to exhaustion and stores it at `cache`.
pub fn convert<S: JetSource>(name: &str, source: &mut S, cache: &Path) -> Result<RawSample> {
    let sample = RawSample {
        name: name.to_string(),
        jets: source.read_all()?,
    };
    info!(jets = sample.len(), "Save {}", cache.display());
    save_bincode(&sample, cache)?;
    Ok(sample)
}

/// Returns the cached sample at `cache`, or rebuilds it from the source
/// produced by `open_source`.
///
/// The cache is bypassed when `recompute` is set, and rebuilt when it is
/// missing or fails to decode. It does not record how the source was
/// opened: an existing cache is served even when the offset or jet limit of
/// the source has changed since it was written, so pass `recompute` after
/// changing them.
pub fn load_or_convert<S, F>(
    name: &str,
    cache: &Path,
    recompute: bool,
    open_source: F,
) -> Result<RawSample>
where
    S: JetSource,
    F: FnOnce() -> Result<S>,
{
    if !recompute && cache.exists() {
        match load_bincode::<RawSample>(cache) {
            Ok(sample) => {
                info!(jets = sample.len(), "Loading from cache {}", cache.display());
                debug!("source offset and jet limit are not checked against the cache");
                return Ok(sample);
            }
            Err(e) => warn!("cache {} unreadable ({e}), recomputing", cache.display()),
        }
    }
    let mut source = open_source()?;
    convert(name, &mut source, cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QgError;
    use crate::jet::tests::jet;
    use crate::source::{write_json_lines, JsonLinesSource, MemorySource};

    #[test]
    fn test_convert_writes_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("q.bin");
        let mut src = MemorySource::new(vec![jet(&[1.0], &[2.0])]);

        let sample = convert("q", &mut src, &cache).unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(load_bincode::<RawSample>(&cache).unwrap(), sample);
    }

    #[test]
    fn test_cache_hit_skips_source() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("q.bin");
        load_or_convert("q", &cache, false, || {
            Ok(MemorySource::new(vec![jet(&[1.0], &[])]))
        })
        .unwrap();

        let again = load_or_convert::<MemorySource, _>("q", &cache, false, || {
            Err(QgError::EmptyData("source must not be opened".into()))
        })
        .unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_corrupt_cache_is_recomputed() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("q.bin");
        std::fs::write(&cache, b"\xff\xff\xff not bincode").unwrap();

        let sample = load_or_convert("q", &cache, false, || {
            Ok(MemorySource::new(vec![jet(&[1.0], &[]), jet(&[2.0], &[])]))
        })
        .unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(load_bincode::<RawSample>(&cache).unwrap().len(), 2);
    }

    #[test]
    fn test_recompute_flag_bypasses_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("q.bin");
        load_or_convert("q", &cache, false, || {
            Ok(MemorySource::new(vec![jet(&[1.0], &[])]))
        })
        .unwrap();

        let sample = load_or_convert("q", &cache, true, || {
            Ok(MemorySource::new(vec![jet(&[1.0], &[]), jet(&[5.0], &[])]))
        })
        .unwrap();
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn test_cache_ignores_changed_source_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("q.jsonl");
        write_json_lines(&input, &[jet(&[1.0], &[]), jet(&[2.0], &[]), jet(&[3.0], &[])])
            .unwrap();
        let cache = tmp.path().join("q.bin");

        let first = load_or_convert("q", &cache, false, || {
            Ok(JsonLinesSource::open(&input)?.with_max_jets(Some(1)))
        })
        .unwrap();
        assert_eq!(first.len(), 1);

        let stale = load_or_convert("q", &cache, false, || JsonLinesSource::open(&input)).unwrap();
        assert_eq!(stale.len(), 1);

        let fresh = load_or_convert("q", &cache, true, || JsonLinesSource::open(&input)).unwrap();
        assert_eq!(fresh.len(), 3);
    }
}
