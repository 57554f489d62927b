//! Finding the source map that belongs to a generated file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::cache::MapperCache;
use super::encoder::SourceMapV3;
use super::mapper::{MapOrigin, PositionMapper};
use crate::error::LocateError;
use crate::identity::SourceFileIdentity;
use waypoint_config::LaunchConfig;

const MAPPING_URL_MARKERS: &[&str] = &["//# sourceMappingURL=", "//@ sourceMappingURL="];

/// Search roots taken from the launch configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHints {
    pub out_dir: Option<PathBuf>,
    pub out_files: Vec<String>,
    pub generated_extensions: Vec<String>,
}

impl SearchHints {
    pub fn from_launch(config: &LaunchConfig) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            out_files: config.out_files.clone(),
            generated_extensions: config.generated_extensions.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.out_dir.is_none() && self.out_files.is_empty()
    }

    /// Whether the runtime executes `path` directly, judged by its extension.
    pub fn is_generated_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.generated_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// What the search roots of one [`SearchHints`] contain.
///
/// Built on first use and kept until the hints change, so script loads
/// without an attached map never walk the roots again.
#[derive(Debug)]
struct RootIndex {
    hints: SearchHints,
    candidates: Vec<SourceFileIdentity>,
    /// Declared generated file -> map path, first map found wins.
    maps: HashMap<SourceFileIdentity, PathBuf>,
}

/// Only the field needed to index a map.
#[derive(Deserialize)]
struct MapHeader {
    #[serde(default)]
    file: Option<String>,
}

/// Locates and loads source maps. Clones share one root index.
#[derive(Debug, Clone, Default)]
pub struct SourceMapLocator {
    index: Arc<RwLock<Option<Arc<RootIndex>>>>,
}

impl SourceMapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the map for `generated`.
    ///
    /// Order: `sourceMappingURL` (inline or referenced file), sibling
    /// `<generated>.map`, then maps under the outDir/outFiles roots whose
    /// declared `file` is `generated`.
    pub fn locate(
        &self,
        generated: &SourceFileIdentity,
        hints: &SearchHints,
    ) -> Result<PositionMapper, LocateError> {
        match self.locate_attached(generated) {
            Err(LocateError::NotFound(_)) if !hints.is_empty() => {
                self.locate_in_roots(generated, hints)
            }
            other => other,
        }
    }

    /// Steps 1 and 2 only: maps reachable from the generated file itself.
    pub fn locate_attached(
        &self,
        generated: &SourceFileIdentity,
    ) -> Result<PositionMapper, LocateError> {
        if let Ok(text) = fs::read_to_string(generated.path()) {
            if let Some(url) = find_mapping_url(&text) {
                if let Some(payload) = url.strip_prefix("data:") {
                    let json = decode_data_url(payload).ok_or_else(|| LocateError::Parse {
                        path: generated.path().to_path_buf(),
                        reason: "unsupported inline source map encoding".to_string(),
                    })?;
                    debug!(file = %generated, "using inline source map");
                    return build_mapper(generated, &json, MapOrigin::Inline, generated.path());
                }

                let referenced = if url.starts_with("file:") {
                    SourceFileIdentity::from_path_or_url(url)
                } else {
                    generated.sibling(url)
                };
                if referenced.path().is_file() {
                    return load_map_file(generated, referenced.path());
                }
                debug!(file = %generated, map = %referenced, "referenced source map is missing");
            }
        }

        let mut sibling = generated.path().as_os_str().to_owned();
        sibling.push(".map");
        let sibling = PathBuf::from(sibling);
        if sibling.is_file() {
            return load_map_file(generated, &sibling);
        }

        Err(LocateError::NotFound(generated.clone()))
    }

    fn locate_in_roots(
        &self,
        generated: &SourceFileIdentity,
        hints: &SearchHints,
    ) -> Result<PositionMapper, LocateError> {
        match self.root_index(hints).maps.get(generated) {
            Some(map_path) => load_map_file(generated, map_path),
            None => Err(LocateError::NotFound(generated.clone())),
        }
    }

    fn root_index(&self, hints: &SearchHints) -> Arc<RootIndex> {
        let current = self
            .index
            .read()
            .as_ref()
            .filter(|index| index.hints == *hints)
            .cloned();
        if let Some(index) = current {
            return index;
        }
        let index = Arc::new(self.build_index(hints));
        *self.index.write() = Some(Arc::clone(&index));
        index
    }

    fn build_index(&self, hints: &SearchHints) -> RootIndex {
        let mut maps = HashMap::new();
        for root in search_roots(hints) {
            for entry in WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("map")
                {
                    continue;
                }
                let Ok(text) = fs::read_to_string(path) else { continue };
                let Ok(header) = serde_json::from_str::<MapHeader>(&text) else { continue };
                maps.entry(declared_generated_file(header.file.as_deref(), path))
                    .or_insert_with(|| path.to_path_buf());
            }
        }
        let candidates = self.candidate_generated_files(hints);
        debug!(maps = maps.len(), candidates = candidates.len(), "indexed search roots");
        RootIndex {
            hints: hints.clone(),
            candidates,
            maps,
        }
    }

    /// Generated files selected by outDir (recursive) and outFiles (globs).
    pub fn candidate_generated_files(&self, hints: &SearchHints) -> Vec<SourceFileIdentity> {
        let mut found: Vec<SourceFileIdentity> = Vec::new();

        if let Some(out_dir) = &hints.out_dir {
            for entry in WalkDir::new(out_dir).into_iter().filter_map(Result::ok) {
                if entry.file_type().is_file() && hints.is_generated_file(entry.path()) {
                    found.push(SourceFileIdentity::new(entry.path()));
                }
            }
        }

        if !hints.out_files.is_empty() {
            match OutFilesMatcher::new(&hints.out_files) {
                Ok(matcher) => {
                    for root in &matcher.roots {
                        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
                            if entry.file_type().is_file() && matcher.is_match(entry.path()) {
                                found.push(SourceFileIdentity::new(entry.path()));
                            }
                        }
                    }
                }
                Err(err) => warn!(error = %err, "ignoring invalid outFiles pattern"),
            }
        }

        found.sort();
        found.dedup();
        found
    }

    /// Load the maps of every candidate generated file into `cache`.
    ///
    /// Returns how many candidates have a mapper afterwards.
    pub fn preload(&self, hints: &SearchHints, cache: &MapperCache) -> usize {
        let mut loaded = 0;
        for candidate in &self.root_index(hints).candidates {
            match cache.get_or_load(candidate, || self.locate(candidate, hints)) {
                Ok(_) => loaded += 1,
                Err(LocateError::Parse { path, reason }) => {
                    warn!(map = %path.display(), %reason, "skipping unreadable source map")
                }
                Err(LocateError::NotFound(_)) => {}
            }
        }
        debug!(loaded, "preloaded source maps from search roots");
        loaded
    }

    /// Mappers under the search roots whose sources include `original`.
    ///
    /// Already cached mappers answer without touching the roots.
    pub fn find_for_source(
        &self,
        original: &SourceFileIdentity,
        hints: &SearchHints,
        cache: &MapperCache,
    ) -> Vec<Arc<PositionMapper>> {
        let cached = cache.find_by_source(original);
        if !cached.is_empty() {
            return cached;
        }
        self.preload(hints, cache);
        cache.find_by_source(original)
    }
}

/// The last `sourceMappingURL` comment in `text`.
fn find_mapping_url(text: &str) -> Option<&str> {
    text.lines().rev().find_map(|line| {
        let line = line.trim();
        if let Some(block) = line.strip_prefix("/*# sourceMappingURL=") {
            return block.strip_suffix("*/").map(str::trim);
        }
        MAPPING_URL_MARKERS
            .iter()
            .find_map(|marker| line.strip_prefix(marker))
            .map(str::trim)
    })
}

/// Decode the part of a `data:` URL after the scheme.
fn decode_data_url(payload: &str) -> Option<String> {
    let (meta, data) = payload.split_once(',')?;
    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .ok()?;
        String::from_utf8(bytes).ok()
    } else {
        Some(data.to_string())
    }
}

fn build_mapper(
    generated: &SourceFileIdentity,
    json: &str,
    origin: MapOrigin,
    reported_path: &Path,
) -> Result<PositionMapper, LocateError> {
    let parse_error = |reason: String| LocateError::Parse {
        path: reported_path.to_path_buf(),
        reason,
    };
    let map = SourceMapV3::from_json(json).map_err(|e| parse_error(e.to_string()))?;
    PositionMapper::new(generated.clone(), &map, origin).map_err(|e| parse_error(e.to_string()))
}

fn load_map_file(
    generated: &SourceFileIdentity,
    map_path: &Path,
) -> Result<PositionMapper, LocateError> {
    let json = fs::read_to_string(map_path).map_err(|e| LocateError::Parse {
        path: map_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(file = %generated, map = %map_path.display(), "loading source map file");
    build_mapper(
        generated,
        &json,
        MapOrigin::File(map_path.to_path_buf()),
        map_path,
    )
}

/// The generated file a map describes: its `file` field, else its own path minus `.map`.
fn declared_generated_file(file: Option<&str>, map_path: &Path) -> SourceFileIdentity {
    let dir = map_path.parent().unwrap_or_else(|| Path::new(""));
    match file.filter(|f| !f.is_empty()) {
        Some(file) if file.starts_with("file:") => SourceFileIdentity::from_path_or_url(file),
        Some(file) => SourceFileIdentity::new(dir.join(file)),
        None => SourceFileIdentity::new(map_path.with_extension("")),
    }
}

fn search_roots(hints: &SearchHints) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = hints.out_dir.iter().cloned().collect();
    roots.extend(
        hints
            .out_files
            .iter()
            .filter(|p| !p.starts_with('!'))
            .map(|p| glob_root(p)),
    );
    roots.sort();
    roots.dedup();
    roots
}

/// The directory prefix of a pattern that contains no glob syntax.
fn glob_root(pattern: &str) -> PathBuf {
    let normalized = pattern.replace('\\', "/");
    let mut root = Vec::new();
    let segments: Vec<&str> = normalized.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        if is_last || segment.contains(['*', '?', '[', '{']) {
            break;
        }
        root.push(*segment);
    }
    if root.is_empty() {
        return PathBuf::from(".");
    }
    let joined = root.join("/");
    if joined.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(joined)
    }
}

fn compile_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(&pattern.replace('\\', "/"))
        .literal_separator(true)
        .build()
}

/// Compiled `outFiles` patterns: includes, `!`-prefixed excludes, and walk roots.
struct OutFilesMatcher {
    include: GlobSet,
    exclude: GlobSet,
    roots: Vec<PathBuf>,
}

impl OutFilesMatcher {
    fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut roots = Vec::new();
        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => {
                    exclude.add(compile_glob(negated)?);
                }
                None => {
                    include.add(compile_glob(pattern)?);
                    roots.push(glob_root(pattern));
                }
            }
        }
        roots.sort();
        roots.dedup();
        Ok(Self {
            include: include.build()?,
            exclude: exclude.build()?,
            roots,
        })
    }

    fn is_match(&self, path: &Path) -> bool {
        let candidate = path.to_string_lossy().replace('\\', "/");
        self.include.is_match(&candidate) && !self.exclude.is_match(&candidate)
    }
}
