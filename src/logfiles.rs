//! Log file discovery and incremental reading.
//!
//! Paths given on the command line (or in `ingest.paths`) may be files or
//! directories. Files are taken as-is; directories are walked and filtered
//! through `ingest.include_globs` / `ingest.exclude_globs`.
//!
//! [`read_from`] reads a file starting at a saved byte offset so that
//! repeated ingestion and watch mode only see appended lines.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;

/// Resolve `paths` into a sorted, de-duplicated list of log files.
pub fn discover(paths: &[PathBuf], ingest: &IngestConfig) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        bail!("No log paths given. Pass paths on the command line or set ingest.paths in the config.");
    }

    let include_set = build_globset(&ingest.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(ingest.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for root in paths {
        if !root.exists() {
            bail!("Log path does not exist: {}", root.display());
        }
        if root.is_file() {
            files.push(root.clone());
            continue;
        }

        let walker = WalkDir::new(root).follow_links(ingest.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Position reached in a file: byte offset and number of lines consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub line: usize,
}

impl Cursor {
    /// Stored form in the `checkpoints` table: `"<offset>:<line>"`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.offset, self.line)
    }

    pub fn decode(s: &str) -> Option<Self> {
        let (offset, line) = s.split_once(':')?;
        Some(Self {
            offset: offset.parse().ok()?,
            line: line.parse().ok()?,
        })
    }
}

/// New content read from a file.
#[derive(Debug, Default)]
pub struct Chunk {
    pub lines: Vec<String>,
    /// Line number (1-based) of `lines[0]`.
    pub first_line: usize,
    /// Where the next read should start.
    pub next: Cursor,
    /// The file shrank below the saved offset and was read from the start.
    pub restarted: bool,
}

/// Read lines appended to `path` since `cursor`.
///
/// With `complete_only`, a trailing line without a newline is left for the
/// next read (it may still be being written). Otherwise it is returned.
/// Invalid UTF-8 is replaced, never rejected.
pub fn read_from(path: &Path, cursor: Cursor, complete_only: bool) -> Result<Chunk> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let len = file.metadata()?.len();

    let (start, restarted) = if len < cursor.offset {
        (Cursor::default(), true)
    } else {
        (cursor, false)
    };

    file.seek(SeekFrom::Start(start.offset))?;
    let mut buf = Vec::with_capacity((len - start.offset) as usize);
    file.read_to_end(&mut buf)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;

    let consumed = if complete_only {
        buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1)
    } else {
        buf.len()
    };
    let text = String::from_utf8_lossy(&buf[..consumed]);
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    Ok(Chunk {
        first_line: start.line + 1,
        next: Cursor {
            offset: start.offset + consumed as u64,
            line: start.line + lines.len(),
        },
        lines,
        restarted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn discover_walks_dirs_with_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("app.log"), "x\n").unwrap();
        std::fs::write(dir.path().join("nested/db.log"), "x\n").unwrap();
        std::fs::write(dir.path().join("image.png"), "x").unwrap();

        let files = discover(&[dir.path().to_path_buf()], &IngestConfig::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["app.log", "db.log"]);
    }

    #[test]
    fn explicit_file_is_taken_regardless_of_globs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("service.out");
        std::fs::write(&file, "x\n").unwrap();
        let files = discover(&[file.clone()], &IngestConfig::default()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn incremental_reads_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\ntwo\npart").unwrap();

        let first = read_from(&path, Cursor::default(), true).unwrap();
        assert_eq!(first.lines, vec!["one", "two"]);
        assert_eq!(first.first_line, 1);
        assert_eq!(first.next, Cursor { offset: 8, line: 2 });

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"ial\nthree\n").unwrap();

        let second = read_from(&path, first.next, true).unwrap();
        assert_eq!(second.lines, vec!["partial", "three"]);
        assert_eq!(second.first_line, 3);
        assert!(!second.restarted);
    }

    #[test]
    fn truncated_file_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "new\n").unwrap();
        let chunk = read_from(&path, Cursor { offset: 500, line: 40 }, false).unwrap();
        assert!(chunk.restarted);
        assert_eq!(chunk.lines, vec!["new"]);
        assert_eq!(chunk.first_line, 1);
    }

    #[test]
    fn cursor_encoding() {
        let c = Cursor { offset: 1024, line: 17 };
        assert_eq!(Cursor::decode(&c.encode()), Some(c));
        assert_eq!(Cursor::decode("garbage"), None);
    }
}
