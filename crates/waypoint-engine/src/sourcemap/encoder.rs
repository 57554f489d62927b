//! Source Map v3 JSON model, `mappings` decoder and builder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::vlq::{self, VlqError};

/// Errors decoding a Source Map v3 document.
#[derive(Debug, Error)]
pub enum MapDecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    Version(u32),

    #[error("bad mapping on generated line {line}: {reason}")]
    Mapping { line: u32, reason: String },
}

/// A Source Map v3 document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapV3 {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

impl SourceMapV3 {
    /// Parse a map, tolerating the `)]}'` anti-XSSI prefix line.
    pub fn from_json(json: &str) -> Result<Self, MapDecodeError> {
        let body = if json.starts_with(")]}") {
            json.split_once('\n').map(|(_, rest)| rest).unwrap_or("")
        } else {
            json
        };
        let map: SourceMapV3 = serde_json::from_str(body)?;
        if map.version != 3 {
            return Err(MapDecodeError::Version(map.version));
        }
        Ok(map)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode `mappings` into absolute entries.
    pub fn entries(&self) -> Result<Vec<MappingEntry>, MapDecodeError> {
        decode_mappings(&self.mappings)
    }
}

/// Original-side half of a mapping, all 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: u32,
    pub line: u32,
    pub column: u32,
    pub name: Option<u32>,
}

/// One decoded segment, all 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub generated_line: u32,
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

fn to_u32(value: i64, line: u32, what: &str) -> Result<u32, MapDecodeError> {
    u32::try_from(value).map_err(|_| MapDecodeError::Mapping {
        line,
        reason: format!("{} out of range ({})", what, value),
    })
}

/// Decode a `mappings` string.
///
/// Generated columns are relative within a line; source index, original
/// line, original column and name index are relative across the whole map.
pub fn decode_mappings(mappings: &str) -> Result<Vec<MappingEntry>, MapDecodeError> {
    let mut entries = Vec::new();
    let (mut source, mut orig_line, mut orig_col, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (line_index, line) in mappings.split(';').enumerate() {
        let generated_line = line_index as u32;
        let mut generated_column = 0i64;

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode_segment(segment).map_err(|e: VlqError| {
                MapDecodeError::Mapping {
                    line: generated_line,
                    reason: e.to_string(),
                }
            })?;

            generated_column += values[0];
            let original = match values.len() {
                1 => None,
                4 | 5 => {
                    source += values[1];
                    orig_line += values[2];
                    orig_col += values[3];
                    let name_index = if values.len() == 5 {
                        name += values[4];
                        Some(to_u32(name, generated_line, "name index")?)
                    } else {
                        None
                    };
                    Some(OriginalLocation {
                        source: to_u32(source, generated_line, "source index")?,
                        line: to_u32(orig_line, generated_line, "original line")?,
                        column: to_u32(orig_col, generated_line, "original column")?,
                        name: name_index,
                    })
                }
                n => {
                    return Err(MapDecodeError::Mapping {
                        line: generated_line,
                        reason: format!("segment has {} fields", n),
                    })
                }
            };

            entries.push(MappingEntry {
                generated_line,
                generated_column: to_u32(generated_column, generated_line, "generated column")?,
                original,
            });
        }
    }

    Ok(entries)
}

/// Builds Source Map v3 documents, mainly for fixtures and tooling.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    file: Option<String>,
    source_root: Option<String>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    entries: Vec<MappingEntry>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&mut self, file: &str) -> &mut Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn set_source_root(&mut self, root: &str) -> &mut Self {
        self.source_root = Some(root.to_string());
        self
    }

    /// Register a source and return its index; repeated sources share an index.
    pub fn add_source(&mut self, source: &str, content: Option<String>) -> u32 {
        if let Some(idx) = self.sources.iter().position(|s| s == source) {
            return idx as u32;
        }
        self.sources.push(source.to_string());
        self.sources_content.push(content);
        (self.sources.len() - 1) as u32
    }

    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            return idx as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    /// Add a 0-based mapping from a generated position to an original one.
    pub fn add_mapping(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        source: u32,
        original_line: u32,
        original_column: u32,
        name: Option<u32>,
    ) -> &mut Self {
        self.entries.push(MappingEntry {
            generated_line,
            generated_column,
            original: Some(OriginalLocation {
                source,
                line: original_line,
                column: original_column,
                name,
            }),
        });
        self
    }

    pub fn build(&self) -> SourceMapV3 {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| (e.generated_line, e.generated_column));

        let mut mappings = String::new();
        let (mut prev_source, mut prev_line, mut prev_col, mut prev_name) = (0i64, 0i64, 0i64, 0i64);
        let mut current_line = 0u32;
        let mut prev_gen_col = 0i64;
        let mut first_in_line = true;

        for entry in &entries {
            while current_line < entry.generated_line {
                mappings.push(';');
                current_line += 1;
                prev_gen_col = 0;
                first_in_line = true;
            }
            if !first_in_line {
                mappings.push(',');
            }
            first_in_line = false;

            vlq::encode(entry.generated_column as i64 - prev_gen_col, &mut mappings);
            prev_gen_col = entry.generated_column as i64;

            if let Some(orig) = entry.original {
                vlq::encode(orig.source as i64 - prev_source, &mut mappings);
                vlq::encode(orig.line as i64 - prev_line, &mut mappings);
                vlq::encode(orig.column as i64 - prev_col, &mut mappings);
                prev_source = orig.source as i64;
                prev_line = orig.line as i64;
                prev_col = orig.column as i64;
                if let Some(name) = orig.name {
                    vlq::encode(name as i64 - prev_name, &mut mappings);
                    prev_name = name as i64;
                }
            }
        }

        let has_content = self.sources_content.iter().any(Option::is_some);
        SourceMapV3 {
            version: 3,
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            sources: self.sources.iter().cloned().map(Some).collect(),
            sources_content: has_content.then(|| self.sources_content.clone()),
            names: self.names.clone(),
            mappings,
        }
    }
}
