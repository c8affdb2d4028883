use crate::{attributes, cancel::CancelToken, sniffer::is_slice_file};

use dicom::object::OpenFileOptions;
use dicom_dictionary_std::tags;
use rayon::prelude::*;
use std::{
    collections::HashMap,
    fmt,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Series identifier used for files without a Series Instance UID.
pub const UNKNOWN_SERIES: &str = "unknown";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DICOM error reading {path}: {source}")]
    Dicom {
        path: PathBuf,
        #[source]
        source: dicom::object::ReadError,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Could not start scan workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A group of slice files sharing one Series Instance UID.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub uid: String,
    pub description: String,
    pub files: Vec<PathBuf>,
}

impl Series {
    pub fn new(uid: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            description: description.into(),
            files: Vec::new(),
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = if self.description.is_empty() {
            "No description"
        } else {
            &self.description
        };
        write!(f, "{description} ({} files)", self.files.len())
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Walk directories in file-name order. Without it the order of series
    /// and of files inside a series follows the filesystem and may differ
    /// between runs.
    pub sorted: bool,
    /// Number of threads reading headers.
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            sorted: true,
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// Header fields needed to group a file.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesHeader {
    pub uid: String,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct SeriesIndexer {
    series: Vec<Series>,
}

impl SeriesIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` and rebuild the series index.
    ///
    /// `root` may be a single file or a directory. Files that fail to parse
    /// are logged and left out. Only a missing root, a cancellation or a
    /// worker pool failure make the whole scan fail, in which case the index
    /// is left empty.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] if `root` does not exist and
    /// [`ScanError::Cancelled`] if `cancel` fired before all headers were read.
    pub fn scan(
        &mut self,
        root: impl AsRef<Path>,
        options: &ScanOptions,
        cancel: &CancelToken,
    ) -> Result<&[Series], ScanError> {
        self.series.clear();
        let root = root.as_ref();

        let files = find_slice_files(root, options)?;
        info!("Found {} DICOM files under {}", files.len(), root.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .build()?;

        let headers: Vec<Option<(PathBuf, SeriesHeader)>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    match read_series_header(path) {
                        Ok(header) => Some((path.clone(), header)),
                        Err(err) => {
                            warn!("Skipping {}: {}", path.display(), err);
                            None
                        }
                    }
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        self.series = group_by_series(headers.into_iter().flatten());
        info!("Grouped into {} series", self.series.len());
        Ok(&self.series)
    }

    /// Series in order of first appearance during the last scan.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn get(&self, uid: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.uid == uid)
    }

    /// `(uid, label)` pairs for a series picker.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.series
            .iter()
            .map(|series| (series.uid.clone(), series.to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// List the candidate slice files below `root`.
pub fn find_slice_files(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }

    if root.is_file() {
        return Ok(if is_slice_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(true);
    if !options.recursive {
        walker = walker.max_depth(1);
    }
    if options.sorted {
        walker = walker.sort_by_file_name();
    }

    Ok(walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                let err = ScanError::Io {
                    path: err.path().unwrap_or(root).to_path_buf(),
                    source: err.into(),
                };
                warn!("Skipping directory entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_slice_file(path))
        .collect())
}

/// Read the series identity of one file without decoding pixel data.
pub fn read_series_header(path: &Path) -> Result<SeriesHeader, ScanError> {
    let object = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|source| ScanError::Dicom {
            path: path.to_path_buf(),
            source,
        })?;

    let uid = attributes::text(&object, tags::SERIES_INSTANCE_UID)
        .unwrap_or_else(|| UNKNOWN_SERIES.to_string());
    let description = attributes::text(&object, tags::SERIES_DESCRIPTION).unwrap_or_default();
    debug!("{} belongs to series {}", path.display(), uid);

    Ok(SeriesHeader { uid, description })
}

/// Group files by series, keeping first-seen series order and file order.
///
/// The description of a series is taken from its first file.
pub fn group_by_series(headers: impl IntoIterator<Item = (PathBuf, SeriesHeader)>) -> Vec<Series> {
    let mut series: Vec<Series> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (path, header) in headers {
        let position = *positions.entry(header.uid.clone()).or_insert_with(|| {
            series.push(Series::new(header.uid, header.description));
            series.len() - 1
        });
        series[position].files.push(path);
    }

    series
}
