use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::dicom::extract_classification;
use crate::error::{Result, SortError};

pub const DEFAULT_EXTENSION: &str = "dcm";

/// Files of one series, in walk order.
pub type SeriesMap = BTreeMap<String, Vec<PathBuf>>;
/// Series grouped under a frame of reference.
pub type ReferenceMap = BTreeMap<String, SeriesMap>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Matched case-insensitively, without the leading dot.
    pub extension: String,
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassificationKey {
    pub modality: String,
    pub reference_id: String,
    pub series_label: String,
}

/// Modality -> frame of reference -> series label -> files.
///
/// Every level is a `BTreeMap`, so enumeration is sorted and stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesGrouping {
    modalities: BTreeMap<String, ReferenceMap>,
}

impl SeriesGrouping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ClassificationKey, path: PathBuf) {
        self.modalities
            .entry(key.modality)
            .or_default()
            .entry(key.reference_id)
            .or_default()
            .entry(key.series_label)
            .or_default()
            .push(path);
    }

    #[cfg(test)]
    pub fn bucket(&self, key: &ClassificationKey) -> Option<&[PathBuf]> {
        self.modalities
            .get(&key.modality)?
            .get(&key.reference_id)?
            .get(&key.series_label)
            .map(Vec::as_slice)
    }

    pub fn modalities(&self) -> impl Iterator<Item = (&str, &ReferenceMap)> {
        self.modalities
            .iter()
            .map(|(modality, references)| (modality.as_str(), references))
    }

    /// Every non-empty bucket with its full key.
    pub fn buckets(&self) -> impl Iterator<Item = (ClassificationKey, &[PathBuf])> {
        self.modalities.iter().flat_map(|(modality, references)| {
            references.iter().flat_map(move |(reference_id, series)| {
                series.iter().map(move |(series_label, files)| {
                    (
                        ClassificationKey {
                            modality: modality.clone(),
                            reference_id: reference_id.clone(),
                            series_label: series_label.clone(),
                        },
                        files.as_slice(),
                    )
                })
            })
        })
    }

    pub fn file_count(&self) -> usize {
        self.buckets().map(|(_, files)| files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.modalities.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ClassifyOutcome {
    pub grouping: SeriesGrouping,
    /// Matching files that could not be classified.
    pub skipped: usize,
}

/// Walks `root` recursively and groups every matching file by its
/// classification key. Files that fail to read are logged and skipped.
pub fn classify(root: &Path, options: &ScanOptions) -> Result<ClassifyOutcome> {
    let metadata = fs::metadata(root).map_err(|source| SortError::io(root, source))?;
    if !metadata.is_dir() {
        return Err(SortError::io(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut outcome = ClassifyOutcome::default();
    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry under {}: {err}", root.display());
                continue;
            }
        };
        if entry.file_type().is_dir() || !has_extension(entry.path(), &options.extension) {
            continue;
        }

        match extract_classification(entry.path()) {
            Ok(key) => outcome.grouping.insert(key, entry.into_path()),
            Err(err) => {
                log::warn!("Skipping file {}: {err}", entry.path().display());
                outcome.skipped += 1;
            }
        }
    }

    log::info!(
        "{} files classified, {} skipped under {}",
        outcome.grouping.file_count(),
        outcome.skipped,
        root.display()
    );
    Ok(outcome)
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case(extension))
}
