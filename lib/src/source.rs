//! Jet ingestion.
//!
//! Simulation output is read as a chain of JSON-lines files, one jet per
//! line with the branch names of the jet tree as keys. A directory source
//! chains every `*.jsonl` / `*.json` file in it, in file-name order.

use crate::error::{QgError, Result};
use crate::jet::JetRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A stream of jet records.
pub trait JetSource {
    /// Returns the next jet, or `None` once the source is exhausted.
    fn next_jet(&mut self) -> Result<Option<JetRecord>>;

    /// Drains the source.
    fn read_all(&mut self) -> Result<Vec<JetRecord>> {
        let mut jets = Vec::new();
        while let Some(jet) = self.next_jet()? {
            jets.push(jet);
        }
        Ok(jets)
    }
}

/// In-memory source, used for generated samples and tests.
pub struct MemorySource {
    jets: std::vec::IntoIter<JetRecord>,
}

impl MemorySource {
    pub fn new(jets: Vec<JetRecord>) -> Self {
        Self {
            jets: jets.into_iter(),
        }
    }
}

impl JetSource for MemorySource {
    fn next_jet(&mut self) -> Result<Option<JetRecord>> {
        match self.jets.next() {
            Some(jet) => {
                jet.validate()?;
                Ok(Some(jet))
            }
            None => Ok(None),
        }
    }
}

struct OpenFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

/// Chain of JSON-lines files.
pub struct JsonLinesSource {
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<OpenFile>,
    offset: usize,
    max_jets: Option<usize>,
    skipped: usize,
    emitted: usize,
}

impl JsonLinesSource {
    /// Chains the given files in order.
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            pending: files.into_iter(),
            current: None,
            offset: 0,
            max_jets: None,
            skipped: 0,
            emitted: 0,
        }
    }

    /// Chains every `*.jsonl` and `*.json` file of `dir`, sorted by name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_json = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("jsonl") | Some("json")
            );
            if path.is_file() && is_json {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(QgError::EmptyData(format!(
                "no .jsonl files in {}",
                dir.display()
            )));
        }
        files.sort();
        Ok(Self::from_files(files))
    }

    /// A single file or every file of a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Ok(Self::from_files(vec![path.to_path_buf()]))
        }
    }

    /// Skips the first `offset` jets of the chain.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Stops after `max_jets` jets.
    pub fn with_max_jets(mut self, max_jets: Option<usize>) -> Self {
        self.max_jets = max_jets;
        self
    }

    fn next_line(&mut self) -> Result<Option<(PathBuf, usize, String)>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.pending.next() else {
                    return Ok(None);
                };
                info!("Process file {}", path.display());
                let file = File::open(&path)?;
                self.current = Some(OpenFile {
                    path,
                    lines: BufReader::new(file).lines(),
                    line_no: 0,
                });
            }
            if let Some(open) = self.current.as_mut() {
                match open.lines.next() {
                    Some(line) => {
                        open.line_no += 1;
                        let line = line?;
                        if line.trim().is_empty() {
                            continue;
                        }
                        return Ok(Some((open.path.clone(), open.line_no, line)));
                    }
                    None => {
                        debug!(lines = open.line_no, "finished {}", open.path.display());
                        self.current = None;
                    }
                }
            }
        }
    }
}

impl JetSource for JsonLinesSource {
    fn next_jet(&mut self) -> Result<Option<JetRecord>> {
        if self.max_jets.is_some_and(|max| self.emitted >= max) {
            return Ok(None);
        }
        loop {
            let Some((path, line_no, line)) = self.next_line()? else {
                return Ok(None);
            };
            if self.skipped < self.offset {
                self.skipped += 1;
                continue;
            }
            let jet: JetRecord = serde_json::from_str(&line).map_err(|e| QgError::Parse {
                path: path.clone(),
                line: line_no,
                message: e.to_string(),
            })?;
            jet.validate().map_err(|e| QgError::Parse {
                path,
                line: line_no,
                message: e.to_string(),
            })?;
            self.emitted += 1;
            return Ok(Some(jet));
        }
    }
}

/// Writes jets as JSON lines, the format [`JsonLinesSource`] reads.
pub fn write_json_lines(path: impl AsRef<Path>, jets: &[JetRecord]) -> Result<()> {
    use std::io::Write;
    let mut out = std::io::BufWriter::new(File::create(path)?);
    for jet in jets {
        serde_json::to_writer(&mut out, jet)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
