//! Source map composition.
//!
//! A script passes through three texts before it reaches the bundle: the
//! compiled module (printed with a map back to its source), the linked body
//! (spliced from the compiled text) and the assembled bundle (re-printed
//! once more with its own map). The final map chains all three so every
//! token points at the file the author wrote.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};
use std::collections::HashMap;
use std::path::{Component, Path};

use super::graph::ModuleGraph;

/// A run of linked text and where it came from in the compiled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub linked: usize,
    pub compiled: usize,
    pub len: usize,
    /// Copied verbatim. Otherwise the run is replacement text and every
    /// offset in it maps to `compiled`.
    pub exact: bool,
}

impl Segment {
    pub fn copied(linked: usize, compiled: usize, len: usize) -> Self {
        Segment {
            linked,
            compiled,
            len,
            exact: true,
        }
    }

    pub fn replaced(linked: usize, compiled: usize, len: usize) -> Self {
        Segment {
            linked,
            compiled,
            len,
            exact: false,
        }
    }

    pub fn shifted(self, by: usize) -> Self {
        Segment {
            linked: self.linked + by,
            ..self
        }
    }
}

/// Compiled offset of a linked offset; `None` inside generated preamble.
pub(crate) fn compiled_offset(segments: &[Segment], linked: usize) -> Option<usize> {
    let index = segments.partition_point(|s| s.linked <= linked).checked_sub(1)?;
    let segment = segments[index];
    if linked >= segment.linked + segment.len {
        return None;
    }
    Some(if segment.exact {
        segment.compiled + (linked - segment.linked)
    } else {
        segment.compiled
    })
}

/// Line starts of a text, for converting between byte offsets and
/// `(line, UTF-16 column)` pairs.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { starts }
    }

    pub fn offset(&self, text: &str, line: u32, column: u32) -> Option<usize> {
        let start = *self.starts.get(line as usize)?;
        let end = self
            .starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or(text.len());
        let mut units = 0u32;
        for (i, ch) in text.get(start..end)?.char_indices() {
            if units >= column {
                return Some(start + i);
            }
            units += ch.len_utf16() as u32;
        }
        (units >= column).then_some(end)
    }

    pub fn position(&self, text: &str, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let start = self.starts[line];
        let column = text
            .get(start..offset)
            .map(|s| s.encode_utf16().count())
            .unwrap_or_default();
        (line as u32, column as u32)
    }
}

/// Generated position to original position, one sorted row per line.
#[derive(Debug, Clone, Default)]
struct MappingTable {
    /// `(generated column, original line, original column)`
    lines: Vec<Vec<(u32, u32, u32)>>,
}

impl MappingTable {
    fn from_json(json: &str) -> Result<Self, String> {
        let map = SourceMap::from_json_string(json).map_err(|e| format!("{e:?}"))?;
        let mut lines: Vec<Vec<(u32, u32, u32)>> = Vec::new();
        for token in map.get_tokens() {
            if token.get_source_id().is_none() {
                continue;
            }
            let line = token.get_dst_line() as usize;
            if lines.len() <= line {
                lines.resize_with(line + 1, Vec::new);
            }
            lines[line].push((token.get_dst_col(), token.get_src_line(), token.get_src_col()));
        }
        for row in &mut lines {
            row.sort_by_key(|t| t.0);
        }
        Ok(MappingTable { lines })
    }

    /// Nearest mapping at or before `column` on the same line.
    fn lookup(&self, line: u32, column: u32) -> Option<(u32, u32)> {
        let row = self.lines.get(line as usize)?;
        let index = row.partition_point(|t| t.0 <= column).checked_sub(1)?;
        let (_, src_line, src_col) = row[index];
        Some((src_line, src_col))
    }
}

/// What a linked module needs to map its text back to the source file.
#[derive(Debug, Clone)]
pub struct ModuleOrigin {
    source: String,
    compiled: String,
    compiled_lines: LineIndex,
    table: MappingTable,
    segments: Vec<Segment>,
}

impl ModuleOrigin {
    pub(crate) fn new(
        source: String,
        compiled: String,
        map: &str,
        segments: Vec<Segment>,
    ) -> Result<Self, String> {
        Ok(ModuleOrigin {
            compiled_lines: LineIndex::new(&compiled),
            table: MappingTable::from_json(map)?,
            source,
            compiled,
            segments,
        })
    }

    /// Original `(line, column)` of a byte offset into the linked body.
    fn original(&self, linked: usize) -> Option<(u32, u32)> {
        let offset = compiled_offset(&self.segments, linked)?;
        let (line, column) = self.compiled_lines.position(&self.compiled, offset);
        self.table.lookup(line, column)
    }
}

/// Byte range of one module body inside the assembled bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ModuleSpan {
    pub start: usize,
    pub end: usize,
}

/// Rewrites the bundle's own map so it points at original sources. Sources
/// are listed relative to the directory of `outfile`, with their contents.
pub(crate) fn compose(
    bundle_map: &str,
    assembled: &str,
    spans: &[ModuleSpan],
    graph: &ModuleGraph,
    outfile: &Path,
) -> Result<String, String> {
    let bundle = SourceMap::from_json_string(bundle_map).map_err(|e| format!("{e:?}"))?;
    let lines = LineIndex::new(assembled);
    let out_dir = outfile.parent().unwrap_or_else(|| Path::new(""));
    let out_dir = std::fs::canonicalize(out_dir).unwrap_or_else(|_| out_dir.to_path_buf());

    let mut builder = SourceMapBuilder::default();
    if let Some(name) = outfile.file_name().and_then(|n| n.to_str()) {
        builder.set_file(name);
    }
    let mut source_ids: HashMap<usize, u32> = HashMap::new();

    for token in bundle.get_tokens() {
        let Some(offset) = lines.offset(assembled, token.get_src_line(), token.get_src_col()) else {
            continue;
        };
        let Some(index) = spans.partition_point(|s| s.start <= offset).checked_sub(1) else {
            continue;
        };
        let span = spans[index];
        if offset >= span.end {
            continue;
        }
        let Some(module) = graph.modules.get(index) else {
            continue;
        };
        let Some(origin) = &module.origin else {
            continue;
        };
        let Some((src_line, src_col)) = origin.original(offset - span.start) else {
            continue;
        };
        let source_id = *source_ids.entry(index).or_insert_with(|| {
            builder.add_source_and_content(&relative_source(&out_dir, &module.path), &origin.source)
        });
        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            src_line,
            src_col,
            Some(source_id),
            None,
        );
    }
    Ok(builder.into_sourcemap().to_json_string())
}

/// `path` relative to `from_dir`, with `/` separators.
fn relative_source(from_dir: &Path, path: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = path.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_map_copied_and_replaced_runs() {
        // "__pre\n" + "const a = " + "(0, x.f)" + "();"  from  "const a = f();"
        let segments = vec![
            Segment::copied(6, 0, 10),
            Segment::replaced(16, 10, 8),
            Segment::copied(24, 11, 3),
        ];
        assert_eq!(compiled_offset(&segments, 2), None);
        assert_eq!(compiled_offset(&segments, 6), Some(0));
        assert_eq!(compiled_offset(&segments, 12), Some(6));
        assert_eq!(compiled_offset(&segments, 20), Some(10));
        assert_eq!(compiled_offset(&segments, 25), Some(12));
        assert_eq!(compiled_offset(&segments, 27), None);
        assert_eq!(Segment::copied(0, 4, 2).shifted(3).linked, 3);
    }

    #[test]
    fn test_line_index_uses_utf16_columns() {
        let text = "ab\n\u{1F600}cd\nx";
        let lines = LineIndex::new(text);
        let c = text.find('c').unwrap();
        assert_eq!(lines.position(text, c), (1, 2));
        assert_eq!(lines.offset(text, 1, 2), Some(c));
        assert_eq!(lines.offset(text, 2, 0), Some(text.len() - 1));
        assert_eq!(lines.offset(text, 2, 1), Some(text.len()));
        assert_eq!(lines.offset(text, 2, 5), None);
        assert_eq!(lines.offset(text, 9, 0), None);
    }

    #[test]
    fn test_relative_sources() {
        assert_eq!(
            relative_source(Path::new("/p/build"), Path::new("/p/src/player/index.ts")),
            "../src/player/index.ts"
        );
        assert_eq!(
            relative_source(Path::new("/p"), Path::new("/p/a.ts")),
            "a.ts"
        );
    }

    #[test]
    fn test_mapping_table_lookup_is_per_line() {
        let mut builder = SourceMapBuilder::default();
        let id = builder.add_source_and_content("a.ts", "x");
        builder.add_token(0, 0, 4, 0, Some(id), None);
        builder.add_token(0, 10, 5, 2, Some(id), None);
        builder.add_token(2, 3, 7, 1, Some(id), None);
        let json = builder.into_sourcemap().to_json_string();

        let table = MappingTable::from_json(&json).unwrap();
        assert_eq!(table.lookup(0, 9), Some((4, 0)));
        assert_eq!(table.lookup(0, 12), Some((5, 2)));
        assert_eq!(table.lookup(1, 0), None);
        assert_eq!(table.lookup(2, 2), None);
        assert_eq!(table.lookup(2, 8), Some((7, 1)));
    }
}
