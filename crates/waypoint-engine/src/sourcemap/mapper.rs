//! Bidirectional position translation over one loaded source map.

use std::path::{Path, PathBuf};

use super::encoder::{MapDecodeError, SourceMapV3};
use crate::identity::SourceFileIdentity;
use crate::location::{Location, Position};

/// Where a map was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOrigin {
    /// `data:` URL inside the generated file.
    Inline,
    /// A `.map` file on disk.
    File(PathBuf),
}

/// A breakpoint position translated to the generated side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPosition {
    pub generated: Location,
    /// The original position actually bound; may be a later line than requested.
    pub original: Location,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    gen_line: u32,
    gen_col: u32,
    source: usize,
    orig_line: u32,
    orig_col: u32,
}

/// Translates between original and generated coordinates of one generated file.
///
/// Immutable once built. All public positions are 1-based.
#[derive(Debug)]
pub struct PositionMapper {
    generated: SourceFileIdentity,
    origin: MapOrigin,
    sources: Vec<SourceFileIdentity>,
    /// Sorted by (gen_line, gen_col).
    by_generated: Vec<Segment>,
    /// Per source, sorted by (orig_line, orig_col, gen_line, gen_col).
    by_original: Vec<Vec<Segment>>,
}

impl PositionMapper {
    /// Build a mapper for `generated` from a decoded map.
    pub fn new(
        generated: SourceFileIdentity,
        map: &SourceMapV3,
        origin: MapOrigin,
    ) -> Result<Self, MapDecodeError> {
        let base_dir: Option<PathBuf> = match &origin {
            MapOrigin::File(path) => path.parent().map(Path::to_path_buf),
            MapOrigin::Inline => generated.parent().map(Path::to_path_buf),
        };

        let mut sources: Vec<SourceFileIdentity> = Vec::new();
        let raw_to_unique: Vec<Option<usize>> = map
            .sources
            .iter()
            .map(|raw| {
                raw.as_deref().map(|raw| {
                    let id = resolve_source(map.source_root.as_deref(), raw, base_dir.as_deref());
                    match sources.iter().position(|s| *s == id) {
                        Some(idx) => idx,
                        None => {
                            sources.push(id);
                            sources.len() - 1
                        }
                    }
                })
            })
            .collect();

        let mut by_generated = Vec::new();
        for entry in map.entries()? {
            let Some(orig) = entry.original else { continue };
            let Some(Some(source)) = raw_to_unique.get(orig.source as usize).copied() else {
                continue;
            };
            by_generated.push(Segment {
                gen_line: entry.generated_line,
                gen_col: entry.generated_column,
                source,
                orig_line: orig.line,
                orig_col: orig.column,
            });
        }
        by_generated.sort_by_key(|s| (s.gen_line, s.gen_col));

        let mut by_original = vec![Vec::new(); sources.len()];
        for seg in &by_generated {
            by_original[seg.source].push(*seg);
        }
        for segs in &mut by_original {
            segs.sort_by_key(|s| (s.orig_line, s.orig_col, s.gen_line, s.gen_col));
        }

        Ok(Self {
            generated,
            origin,
            sources,
            by_generated,
            by_original,
        })
    }

    pub fn generated_file(&self) -> &SourceFileIdentity {
        &self.generated
    }

    pub fn origin(&self) -> &MapOrigin {
        &self.origin
    }

    /// Resolved original sources, in map order without duplicates.
    pub fn sources(&self) -> &[SourceFileIdentity] {
        &self.sources
    }

    pub fn has_source(&self, source: &SourceFileIdentity) -> bool {
        self.sources.contains(source)
    }

    /// Translate an original position into the generated file.
    ///
    /// A line with no code binds to the next mapped line of the same source.
    /// Returns `None` when nothing at or after the requested line is mapped.
    pub fn generated_position_for(
        &self,
        source: &SourceFileIdentity,
        requested: Position,
    ) -> Option<MappedPosition> {
        let idx = self.sources.iter().position(|s| s == source)?;
        let segs = &self.by_original[idx];
        let line0 = requested.line.checked_sub(1)?;

        let start = segs.partition_point(|s| s.orig_line < line0);
        let first = segs.get(start)?;

        let chosen = if first.orig_line == line0 {
            let end = start + segs[start..].partition_point(|s| s.orig_line == line0);
            let line_segs = &segs[start..end];
            match requested.column.and_then(|c| c.checked_sub(1)) {
                Some(col0) => line_segs
                    .iter()
                    .find(|s| s.orig_col >= col0)
                    .or_else(|| line_segs.last())
                    .copied()?,
                None => *first,
            }
        } else {
            *first
        };

        let original_column = if chosen.orig_line == line0 && requested.column.is_some() {
            Some(chosen.orig_col + 1)
        } else {
            None
        };

        Some(MappedPosition {
            generated: Location {
                file: self.generated.clone(),
                position: Position::new(chosen.gen_line + 1, Some(chosen.gen_col + 1)),
            },
            original: Location {
                file: self.sources[idx].clone(),
                position: Position::new(chosen.orig_line + 1, original_column),
            },
        })
    }

    /// Translate a generated position back to its original source.
    ///
    /// Uses the closest segment at or before the column on the same line,
    /// falling back to the first segment of the line.
    pub fn original_position_for(&self, generated: Position) -> Option<Location> {
        let line0 = generated.line.checked_sub(1)?;
        let start = self.by_generated.partition_point(|s| s.gen_line < line0);
        let end = start + self.by_generated[start..].partition_point(|s| s.gen_line == line0);
        let line_segs = &self.by_generated[start..end];
        let first = line_segs.first()?;

        let seg = match generated.column.and_then(|c| c.checked_sub(1)) {
            Some(col0) => line_segs
                .iter()
                .rev()
                .find(|s| s.gen_col <= col0)
                .unwrap_or(first),
            None => first,
        };

        Some(Location {
            file: self.sources[seg.source].clone(),
            position: Position::new(seg.orig_line + 1, Some(seg.orig_col + 1)),
        })
    }
}

/// Resolve a `sources` entry against `sourceRoot` and the map's directory.
fn resolve_source(source_root: Option<&str>, source: &str, base: Option<&Path>) -> SourceFileIdentity {
    let has_scheme = |s: &str| s.contains("://") || s.starts_with("file:");

    let joined = match source_root.filter(|r| !r.is_empty()) {
        Some(_) if has_scheme(source) || Path::new(source).is_absolute() => source.to_string(),
        Some(root) => format!("{}/{}", root.trim_end_matches('/'), source),
        None => source.to_string(),
    };

    if joined.starts_with("file:") {
        return SourceFileIdentity::from_path_or_url(&joined);
    }
    if has_scheme(&joined) || Path::new(&joined).is_absolute() {
        return SourceFileIdentity::new(&joined);
    }
    match base {
        Some(dir) => SourceFileIdentity::new(dir.join(&joined)),
        None => SourceFileIdentity::new(&joined),
    }
}
