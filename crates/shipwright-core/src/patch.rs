//! Unified diff parsing for preview rendering.
//!
//! Parses one file's patch text into hunks for structured display. A
//! malformed patch is isolated to that file: `PatchView::from_patch`
//! falls back to the raw text instead of failing the tree or selection.

use serde::{Deserialize, Serialize};

use crate::error::DiffParseError;

/// Origin of a single patch line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One line inside a hunk, without its origin marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLine {
    pub kind: LineKind,
    pub content: String,
}

/// A contiguous change region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    /// Trailing section heading from the `@@` line, if any.
    pub heading: String,
    pub lines: Vec<PatchLine>,
}

/// Parse `start[,count]` from one side of a hunk header.
fn parse_range(spec: &str) -> Option<(u32, u32)> {
    match spec.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((spec.parse().ok()?, 1)),
    }
}

/// Parse a `@@ -a,b +c,d @@ heading` line.
fn parse_hunk_header(line: &str) -> Result<Hunk, DiffParseError> {
    let bad = || DiffParseError::BadHunkHeader(line.to_string());

    let rest = line.strip_prefix("@@ -").ok_or_else(bad)?;
    let (old_spec, rest) = rest.split_once(" +").ok_or_else(bad)?;
    let (new_spec, heading) = rest.split_once(" @@").ok_or_else(bad)?;

    let (old_start, old_lines) = parse_range(old_spec).ok_or_else(bad)?;
    let (new_start, new_lines) = parse_range(new_spec).ok_or_else(bad)?;

    Ok(Hunk {
        old_start,
        old_lines,
        new_start,
        new_lines,
        heading: heading.trim_start().to_string(),
        lines: Vec::new(),
    })
}

/// Parse one file's unified diff text into hunks.
///
/// Lines before the first `@@` header (the `diff --git`/`index`/`---`/
/// `+++` preamble) are skipped. Declared line counts are checked against
/// the hunk body.
pub fn parse_patch(text: &str) -> Result<Vec<Hunk>, DiffParseError> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut in_preamble = true;

    for line in text.lines() {
        if line.starts_with("@@ -") {
            if let Some(done) = hunks.last() {
                check_counts(done)?;
            }
            hunks.push(parse_hunk_header(line)?);
            in_preamble = false;
            continue;
        }
        if in_preamble {
            continue;
        }
        let hunk = match hunks.last_mut() {
            Some(h) => h,
            None => continue,
        };
        if let Some(content) = line.strip_prefix('+') {
            hunk.lines.push(PatchLine {
                kind: LineKind::Added,
                content: content.to_string(),
            });
        } else if let Some(content) = line.strip_prefix('-') {
            hunk.lines.push(PatchLine {
                kind: LineKind::Removed,
                content: content.to_string(),
            });
        } else if let Some(content) = line.strip_prefix(' ') {
            hunk.lines.push(PatchLine {
                kind: LineKind::Context,
                content: content.to_string(),
            });
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        } else if line.is_empty() {
            // some tools emit empty context lines without the leading space
            hunk.lines.push(PatchLine {
                kind: LineKind::Context,
                content: String::new(),
            });
        } else {
            return Err(DiffParseError::UnexpectedLine(line.to_string()));
        }
    }

    match hunks.last() {
        Some(done) => check_counts(done)?,
        None => return Err(DiffParseError::NoHunks),
    }
    Ok(hunks)
}

fn check_counts(hunk: &Hunk) -> Result<(), DiffParseError> {
    let old = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Added)
        .count() as u32;
    let new = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Removed)
        .count() as u32;
    if old != hunk.old_lines || new != hunk.new_lines {
        return Err(DiffParseError::CountMismatch(format!(
            "declared -{},{} +{},{} but saw {} old / {} new lines",
            hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines, old, new
        )));
    }
    Ok(())
}

/// Per-file preview rendering input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchView {
    /// Structured hunks.
    Parsed(Vec<Hunk>),
    /// Fallback when the patch text did not parse: raw unified diff.
    Raw(String),
}

impl PatchView {
    /// Parse patch text, falling back to raw display on any parse error.
    pub fn from_patch(text: &str) -> PatchView {
        match parse_patch(text) {
            Ok(hunks) => PatchView::Parsed(hunks),
            Err(err) => {
                tracing::debug!(%err, "patch did not parse, rendering raw");
                PatchView::Raw(text.to_string())
            }
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, PatchView::Parsed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "\
diff --git a/a.xml b/a.xml
index 000..111 100644
--- a/a.xml
+++ b/a.xml
@@ -1,3 +1,3 @@ <service>
 <a>
-<old/>
+<new/>
 </a>";

    #[test]
    fn test_parse_simple_patch() {
        let hunks = parse_patch(SIMPLE).unwrap();
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!((hunk.old_start, hunk.old_lines), (1, 3));
        assert_eq!((hunk.new_start, hunk.new_lines), (1, 3));
        assert_eq!(hunk.heading, "<service>");
        assert_eq!(hunk.lines.len(), 4);
        assert_eq!(hunk.lines[1].kind, LineKind::Removed);
        assert_eq!(hunk.lines[1].content, "<old/>");
        assert_eq!(hunk.lines[2].kind, LineKind::Added);
    }

    #[test]
    fn test_parse_single_line_ranges() {
        let text = "@@ -1 +1 @@\n-a\n+b";
        let hunks = parse_patch(text).unwrap();
        assert_eq!(hunks[0].old_lines, 1);
        assert_eq!(hunks[0].new_lines, 1);
    }

    #[test]
    fn test_no_newline_marker_skipped() {
        let text = "@@ -1 +1 @@\n-a\n+b\n\\ No newline at end of file";
        let hunks = parse_patch(text).unwrap();
        assert_eq!(hunks[0].lines.len(), 2);
    }

    #[test]
    fn test_bad_header_is_error() {
        let err = parse_patch("@@ -x,3 +1,3 @@\n a").unwrap_err();
        assert!(matches!(err, DiffParseError::BadHunkHeader(_)));
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let text = "@@ -1,5 +1,5 @@\n-a\n+b";
        let err = parse_patch(text).unwrap_err();
        assert!(matches!(err, DiffParseError::CountMismatch(_)));
    }

    #[test]
    fn test_garbage_is_no_hunks() {
        assert_eq!(parse_patch("not a diff at all").unwrap_err(), DiffParseError::NoHunks);
    }

    #[test]
    fn test_view_falls_back_to_raw() {
        let view = PatchView::from_patch("Binary files a/x and b/x differ");
        assert!(!view.is_parsed());
        match view {
            PatchView::Raw(text) => assert!(text.contains("Binary files")),
            PatchView::Parsed(_) => panic!("expected raw fallback"),
        }

        let view = PatchView::from_patch(SIMPLE);
        assert!(view.is_parsed());
    }
}
