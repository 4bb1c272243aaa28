//! Document discovery and text extraction.
//!
//! The loader walks an input directory recursively (without following
//! symlinks) and yields one [`LoadEvent`] per file it recognises. Failures on
//! individual files are yielded as `Err` items so the caller can count them
//! and move on.

use chrono::Utc;
use docvec_core::config::{ExtractorKind, IngestConfig};
use docvec_core::{AppError, AppResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::types::{Document, DocumentMetadata};

/// Outcome of visiting one recognised file.
#[derive(Debug)]
pub enum LoadEvent {
    /// Text was extracted
    Loaded(Document),

    /// File was recognised but not loaded
    Skipped { path: PathBuf, reason: String },
}

/// Reads documents from a directory according to the extension policy.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    policy: IngestConfig,
}

impl DocumentLoader {
    pub fn new(policy: IngestConfig) -> Self {
        Self { policy }
    }

    /// Lazily load every recognised file under `root`.
    ///
    /// Fails up front with `AppError::Io` if `root` is missing, is not a
    /// directory, or cannot be listed.
    pub fn load<'a>(
        &'a self,
        root: &Path,
    ) -> AppResult<impl Iterator<Item = AppResult<LoadEvent>> + 'a> {
        let metadata = fs::metadata(root).map_err(|e| AppError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(AppError::io(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        fs::read_dir(root).map_err(|e| AppError::io(root, e))?;

        let include_hidden = self.policy.include_hidden;
        let root = root.to_path_buf();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| include_hidden || entry.depth() == 0 || !is_hidden(entry));

        Ok(walker.filter_map(move |entry| match entry {
            Ok(entry) => self.visit(&entry),
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                Some(Err(AppError::io(path, source)))
            }
        }))
    }

    /// Handle one directory entry; `None` for entries that are not ours.
    fn visit(&self, entry: &DirEntry) -> Option<AppResult<LoadEvent>> {
        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str())?;
        let kind = self.policy.extractor_for(extension)?;

        if kind == ExtractorKind::Skip {
            tracing::debug!("Skipping {:?}: no extractor for .{}", path, extension);
            return Some(Ok(LoadEvent::Skipped {
                path: path.to_path_buf(),
                reason: format!("no extractor configured for .{}", extension.to_lowercase()),
            }));
        }

        Some(read_document(path, kind))
    }
}

/// Read and extract a single file.
pub fn read_document(path: &Path, kind: ExtractorKind) -> AppResult<LoadEvent> {
    let bytes = fs::read(path).map_err(|e| AppError::io(path, e))?;

    if bytes.contains(&0) {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Ok(LoadEvent::Skipped {
            path: path.to_path_buf(),
            reason: "binary content".to_string(),
        });
    }

    let raw = String::from_utf8_lossy(&bytes);
    let text = match kind {
        ExtractorKind::Text => raw.into_owned(),
        ExtractorKind::Markdown => clean_markdown(&raw),
        ExtractorKind::Html => clean_html(&raw),
        ExtractorKind::Skip => {
            return Ok(LoadEvent::Skipped {
                path: path.to_path_buf(),
                reason: "extractor is skip".to_string(),
            })
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(LoadEvent::Loaded(Document {
        source: path.to_path_buf(),
        text,
        metadata: DocumentMetadata {
            filename,
            ingested_at: Utc::now(),
            extractor: kind,
            size_bytes: bytes.len() as u64,
        },
    }))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Strip heading markers, code fences and horizontal rules.
///
/// Paragraph breaks are kept as a single blank line.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if is_rule(trimmed) || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if trimmed.is_empty() {
            pending_break = !result.is_empty();
            continue;
        }

        if pending_break {
            result.push('\n');
            pending_break = false;
        }
        result.push_str(trimmed);
        result.push('\n');
    }

    result.trim().to_string()
}

/// A thematic break: three or more of one of `-`, `*`, `_`, optionally spaced.
fn is_rule(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

/// Strip tags along with `<script>` and `<style>` bodies, then collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    let lower = text.to_ascii_lowercase();

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;

            let rest = &lower[i..];
            if rest.starts_with("<script") {
                in_script = true;
            } else if rest.starts_with("</script") {
                in_script = false;
            } else if rest.starts_with("<style") {
                in_style = true;
            } else if rest.starts_with("</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            // Tags separate words
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loaded_names(loader: &DocumentLoader, root: &Path) -> Vec<String> {
        loader
            .load(root)
            .unwrap()
            .filter_map(|event| match event {
                Ok(LoadEvent::Loaded(doc)) => Some(doc.metadata.filename),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let loader = DocumentLoader::new(IngestConfig::default());
        let result = loader.load(Path::new("/nonexistent/docvec-input"));
        assert!(matches!(result, Err(AppError::Io { .. })));
    }

    #[test]
    fn test_file_instead_of_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let loader = DocumentLoader::new(IngestConfig::default());
        assert!(matches!(loader.load(&file), Err(AppError::Io { .. })));
    }

    #[test]
    fn test_loads_recursively_and_ignores_unknown() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        fs::write(temp.path().join("nested/b.MD"), "# Beta\n\nbody").unwrap();
        fs::write(temp.path().join("c.rs"), "fn main() {}").unwrap();

        let loader = DocumentLoader::new(IngestConfig::default());
        let names = loaded_names(&loader, temp.path());
        assert_eq!(names, vec!["a.txt".to_string(), "b.MD".to_string()]);
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/notes.txt"), "hidden dir").unwrap();
        fs::write(temp.path().join(".secret.txt"), "hidden file").unwrap();
        fs::write(temp.path().join("visible.txt"), "shown").unwrap();

        let loader = DocumentLoader::new(IngestConfig::default());
        assert_eq!(loaded_names(&loader, temp.path()), vec!["visible.txt"]);

        let loader = DocumentLoader::new(IngestConfig {
            include_hidden: true,
            ..IngestConfig::default()
        });
        assert_eq!(loaded_names(&loader, temp.path()).len(), 3);
    }

    #[test]
    fn test_skip_policy_and_binary_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("manual.pdf"), b"%PDF-1.4").unwrap();
        fs::write(temp.path().join("blob.txt"), b"abc\0def").unwrap();
        fs::write(temp.path().join("ok.txt"), "fine").unwrap();

        let loader = DocumentLoader::new(IngestConfig::default());
        let events: Vec<_> = loader.load(temp.path()).unwrap().collect();
        assert_eq!(events.len(), 3);

        let skipped = events
            .iter()
            .filter(|e| matches!(e, Ok(LoadEvent::Skipped { .. })))
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_non_utf8_is_decoded_lossily() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("latin1.txt");
        fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        match read_document(&path, ExtractorKind::Text).unwrap() {
            LoadEvent::Loaded(doc) => {
                assert!(doc.text.starts_with("caf"));
                assert_eq!(doc.metadata.size_bytes, 4);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text\n---\n";
        let output = clean_markdown(input);
        assert!(output.starts_with("Header\n\nSome text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
        assert!(!output.contains("---"));
    }

    #[test]
    fn test_clean_markdown_keeps_emphasis_lines() {
        let input = "***Warning:*** never delete the store directory.\n\n---\n\n* * *\n\n___\n\nOther text.";
        let output = clean_markdown(input);
        assert_eq!(
            output,
            "***Warning:*** never delete the store directory.\n\nOther text."
        );
    }

    #[test]
    fn test_markdown_document_keeps_bold_italic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.md");
        fs::write(&path, "---- \n**Bold** start\n---not a rule").unwrap();

        match read_document(&path, ExtractorKind::Markdown).unwrap() {
            LoadEvent::Loaded(doc) => {
                assert_eq!(doc.text, "**Bold** start\n---not a rule");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>p { color: red; }</style><script>var x = 1;</script></head>\
                     <body><p>Hello <b>world</b></p><p>again</p></body></html>";
        assert_eq!(clean_html(input), "Hello world again");
    }

    #[test]
    fn test_clean_html_multibyte() {
        let input = "<p>Grüße</p><p>naïve café</p>";
        assert_eq!(clean_html(input), "Grüße naïve café");
    }
}
