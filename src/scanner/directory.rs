//! Library discovery: walk the roots, parse files, group them by series and
//! decide which series folders changed since their last scan.
//!
//! Files are grouped first by *series folder* (the first directory below a
//! root; loose files in a root form one group). Folder groups are the unit
//! of change detection: a group whose directories are all older than the
//! persisted scan time of the series recorded for it is not parsed at all.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use folio_common::paths::{format_for_path, is_junk_name, normalize_path};
use folio_common::{Error, MangaFormat, Result};
use folio_db::models::{Library, Series};
use folio_parser::normalize::normalize;
use folio_parser::{ParsedSeries, Parser, ParserInfo};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::services::ArchiveService;

/// Per-root file with extra exclude globs, one per line.
pub const IGNORE_FILE: &str = ".folioignore";

/// Every file of one series as seen on disk.
#[derive(Debug, Clone)]
pub struct ScannedSeries {
    pub key: ParsedSeries,
    /// Parsed files, sorted by path. Empty when the series is unchanged.
    pub infos: Vec<ParserInfo>,
    pub has_changed: bool,
    /// Series folders that contributed files.
    pub folders: Vec<PathBuf>,
    /// Newest directory mtime among those folders.
    pub latest_folder_change: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Exclude patterns
// ---------------------------------------------------------------------------

/// Compile one exclude glob. Matching is case-insensitive and `*`/`?` never
/// cross a `/`; `**` does.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern.trim().trim_start_matches('/'))
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::invalid_input(format!("bad exclude pattern '{pattern}': {e}")))
}

/// Compiled exclude globs for one root. Patterns containing `/` match the
/// whole root-relative path; others match any single path component.
#[derive(Debug)]
pub struct ExcludeMatcher {
    path_patterns: GlobSet,
    name_patterns: GlobSet,
}

impl Default for ExcludeMatcher {
    fn default() -> Self {
        Self {
            path_patterns: GlobSet::empty(),
            name_patterns: GlobSet::empty(),
        }
    }
}

impl ExcludeMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut paths = GlobSetBuilder::new();
        let mut names = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            let pattern = pattern.trim_end_matches('/');
            match compile_glob(pattern) {
                Ok(glob) if pattern.trim_start_matches('/').contains('/') => {
                    paths.add(glob);
                }
                Ok(glob) => {
                    names.add(glob);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping exclude pattern"),
            }
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build exclude patterns");
                GlobSet::empty()
            })
        };
        Self {
            path_patterns: build(paths),
            name_patterns: build(names),
        }
    }

    /// Library patterns plus the root's ignore file, if it has one.
    fn for_root(library: &Library, root: &Path) -> Self {
        let mut patterns = library.exclude_patterns.clone();
        if let Ok(content) = std::fs::read_to_string(root.join(IGNORE_FILE)) {
            patterns.extend(content.lines().map(String::from));
        }
        Self::new(&patterns)
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if self.path_patterns.is_match(&joined) {
            return true;
        }
        relative
            .components()
            .any(|c| self.name_patterns.is_match(c.as_os_str()))
    }
}

// ---------------------------------------------------------------------------
// Folder groups
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FolderGroup {
    root: PathBuf,
    folder: PathBuf,
    files: Vec<PathBuf>,
    latest_change: Option<DateTime<Utc>>,
}

fn modified(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn accepts(library: &Library, path: &Path) -> bool {
    format_for_path(path).is_some_and(|format| library.accepts(format))
}

/// Walk one series folder: every accepted file below it and the newest mtime
/// of the folder and its subdirectories.
fn walk_group(library: &Library, root: &Path, folder: &Path, excludes: &ExcludeMatcher) -> FolderGroup {
    let mut files = Vec::new();
    let mut latest_change = modified(folder);

    let walker = WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if is_junk_name(&name) {
                return false;
            }
            let relative = e.path().strip_prefix(root).unwrap_or(e.path());
            !excludes.is_excluded(relative)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Error walking directory");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                latest_change = latest_change.max(modified(entry.path()));
            }
            continue;
        }
        if entry.file_type().is_file() && accepts(library, entry.path()) {
            files.push(entry.into_path());
        }
    }

    FolderGroup {
        root: root.to_path_buf(),
        folder: folder.to_path_buf(),
        files,
        latest_change,
    }
}

/// Every series folder of every root. Roots that cannot be read are logged
/// and skipped; the orchestrator checks roots before scanning.
fn collect_groups(library: &Library) -> Vec<FolderGroup> {
    let mut groups = Vec::new();
    for root in &library.folders {
        let root = normalize_path(Path::new(root));
        let excludes = ExcludeMatcher::for_root(library, &root);
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Cannot read library folder");
                continue;
            }
        };

        let mut folders = Vec::new();
        let mut loose = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_junk_name(&name) || excludes.is_excluded(Path::new(&name)) {
                continue;
            }
            if path.is_dir() {
                folders.push(path);
            } else if path.is_file() && accepts(library, &path) {
                loose.push(path);
            }
        }
        folders.sort();
        loose.sort();

        for folder in folders {
            groups.push(walk_group(library, &root, &folder, &excludes));
        }
        if !loose.is_empty() {
            groups.push(FolderGroup {
                latest_change: modified(&root),
                root: root.clone(),
                folder: root,
                files: loose,
            });
        }
    }
    groups
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Walks and parses a library. Never writes.
pub struct DirectoryScanner<'a> {
    parser: &'a dyn Parser,
    archive: &'a dyn ArchiveService,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(parser: &'a dyn Parser, archive: &'a dyn ArchiveService) -> Self {
        Self { parser, archive }
    }

    /// Scan every root of `library`.
    ///
    /// `existing` are the library's persisted series; their `folder_path`
    /// and `last_folder_scanned` drive change detection. With `force` every
    /// folder is parsed.
    pub fn scan(&self, library: &Library, existing: &[Series], force: bool) -> Vec<ScannedSeries> {
        let groups = collect_groups(library);

        let mut by_folder: HashMap<PathBuf, Vec<&Series>> = HashMap::new();
        for series in existing {
            if let Some(folder) = &series.folder_path {
                by_folder
                    .entry(normalize_path(Path::new(folder)))
                    .or_default()
                    .push(series);
            }
        }
        let persisted_for =
            |group: &FolderGroup| by_folder.get(&group.folder).cloned().unwrap_or_default();

        let (changed, unchanged): (Vec<&FolderGroup>, Vec<&FolderGroup>) = groups
            .iter()
            .partition(|group| force || !is_unchanged(group, &persisted_for(*group)));

        let mut parsed = self.parse_groups(library, &changed);

        // A series spanning a changed and an unchanged folder must be
        // reconciled with all of its files.
        let changed_keys: HashSet<(String, MangaFormat)> = parsed
            .iter()
            .flat_map(|(_, infos)| infos.iter().map(|i| (normalize(&i.series), i.format)))
            .collect();
        let (pulled_in, still_unchanged): (Vec<&FolderGroup>, Vec<&FolderGroup>) =
            unchanged.into_iter().partition(|group| {
                persisted_for(*group).iter().any(|s| {
                    changed_keys.contains(&(s.normalized_name.clone(), s.format))
                        || (!s.normalized_localized_name.is_empty()
                            && changed_keys.contains(&(s.normalized_localized_name.clone(), s.format)))
                })
            });
        if !pulled_in.is_empty() {
            parsed.extend(self.parse_groups(library, &pulled_in));
        }

        let mut out = group_by_series(parsed);

        let seen: HashSet<(String, MangaFormat)> = out
            .iter()
            .map(|s| (s.key.normalized_name.clone(), s.key.format))
            .collect();
        for group in still_unchanged {
            for series in persisted_for(group) {
                if seen.contains(&(series.normalized_name.clone(), series.format)) {
                    continue;
                }
                tracing::trace!(series = %series.name, folder = %group.folder.display(), "Folder unchanged, skipping");
                out.push(ScannedSeries {
                    key: ParsedSeries {
                        name: series.name.clone(),
                        normalized_name: series.normalized_name.clone(),
                        format: series.format,
                    },
                    infos: Vec::new(),
                    has_changed: false,
                    folders: vec![group.folder.clone()],
                    latest_folder_change: group.latest_change,
                });
            }
        }

        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Parse only the folders a series lives in: its recorded folder and
    /// every folder holding one of `known_files`. Every folder is parsed
    /// when none of them exists any more.
    pub fn scan_series(&self, library: &Library, series: &Series, known_files: &[PathBuf]) -> Option<ScannedSeries> {
        let groups = collect_groups(library);
        let folder = series
            .folder_path
            .as_ref()
            .map(|f| normalize_path(Path::new(f)));
        let known: HashSet<PathBuf> = known_files.iter().map(|f| normalize_path(f)).collect();

        let mut selected: Vec<&FolderGroup> = groups
            .iter()
            .filter(|g| {
                folder.as_ref() == Some(&g.folder)
                    || g.files.iter().any(|f| known.contains(&normalize_path(f)))
            })
            .collect();
        if selected.is_empty() {
            selected = groups.iter().collect();
        }

        let parsed = self.parse_groups(library, &selected);
        group_by_series(parsed).into_iter().find(|scanned| {
            scanned.key.format == series.format
                && (scanned.key.normalized_name == series.normalized_name
                    || (!series.normalized_localized_name.is_empty()
                        && scanned.key.normalized_name == series.normalized_localized_name))
        })
    }

    fn parse_groups<'g>(
        &self,
        library: &Library,
        groups: &[&'g FolderGroup],
    ) -> Vec<(&'g FolderGroup, Vec<ParserInfo>)> {
        groups
            .par_iter()
            .map(|group| (*group, self.parse_group(library, group)))
            .collect()
    }

    fn parse_group(&self, library: &Library, group: &FolderGroup) -> Vec<ParserInfo> {
        let mut infos = Vec::with_capacity(group.files.len());
        for path in &group.files {
            let format = format_for_path(path).unwrap_or(MangaFormat::Unknown);
            let embedded = match self.archive.read_embedded_metadata(path, format) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to read embedded metadata");
                    None
                }
            };
            match self
                .parser
                .parse(path, &group.root, library.library_type, embedded.as_deref())
            {
                Ok(Some(info)) => infos.push(info),
                Ok(None) => tracing::debug!(file = %path.display(), "Parser skipped file"),
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "Failed to parse file"),
            }
        }
        infos
    }
}

/// Whether a folder can be skipped: it has persisted series and every one
/// of them was scanned after the folder last changed (whole seconds).
fn is_unchanged(group: &FolderGroup, persisted: &[&Series]) -> bool {
    let Some(changed_at) = group.latest_change else {
        return false;
    };
    !persisted.is_empty()
        && persisted.iter().all(|series| {
            series
                .last_folder_scanned
                .as_deref()
                .and_then(parse_timestamp)
                .is_some_and(|scanned_at| changed_at.timestamp() < scanned_at.timestamp())
        })
}

/// Fold files whose localized name is another series' primary name into
/// that series.
fn merge_localized(infos: &mut [ParserInfo]) {
    let mut names: HashMap<(String, MangaFormat), String> = HashMap::new();
    for info in infos.iter() {
        names
            .entry((normalize(&info.series), info.format))
            .or_insert_with(|| info.series.clone());
    }
    for info in infos.iter_mut() {
        if info.localized_series.is_empty() {
            continue;
        }
        let localized = normalize(&info.localized_series);
        if localized == normalize(&info.series) {
            continue;
        }
        if let Some(primary) = names.get(&(localized, info.format)) {
            info.series = primary.clone();
        }
    }
}

fn group_by_series(parsed: Vec<(&FolderGroup, Vec<ParserInfo>)>) -> Vec<ScannedSeries> {
    let mut all: Vec<(&FolderGroup, ParserInfo)> = parsed
        .into_iter()
        .flat_map(|(group, infos)| infos.into_iter().map(move |info| (group, info)))
        .collect();
    {
        let mut infos: Vec<ParserInfo> = all.iter().map(|(_, i)| i.clone()).collect();
        merge_localized(&mut infos);
        for ((_, info), merged) in all.iter_mut().zip(infos) {
            *info = merged;
        }
    }
    all.sort_by(|a, b| a.1.full_file_path.cmp(&b.1.full_file_path));

    let mut out: Vec<ScannedSeries> = Vec::new();
    let mut index: HashMap<ParsedSeries, usize> = HashMap::new();
    for (group, info) in all {
        let key = info.series_key();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            out.push(ScannedSeries {
                key,
                infos: Vec::new(),
                has_changed: true,
                folders: Vec::new(),
                latest_folder_change: None,
            });
            out.len() - 1
        });
        let scanned = &mut out[slot];
        if !scanned.folders.contains(&group.folder) {
            scanned.folders.push(group.folder.clone());
            scanned.latest_folder_change = scanned.latest_folder_change.max(group.latest_change);
        }
        scanned.infos.push(info);
    }
    out
}
