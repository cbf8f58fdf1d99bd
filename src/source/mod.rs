//! Chunked readers for per-subject tables.
//!
//! A subject table is read as a lazy, forward-only sequence of chunks.
//! Each chunk holds at most `chunk_size` rows, and only the heart-rate,
//! temperature and sleep-stage columns are kept in memory.

use crate::error::AnalysisError;
use crate::models::{Chunk, HR_COLUMN, STAGE_COLUMN, TEMP_COLUMN};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name suffix of a subject table.
pub const TABLE_SUFFIX: &str = "_whole_df.csv";

/// Cell values read as missing numbers or labels.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Something that can stream a subject's table in chunks.
pub trait ChunkSource {
    /// Iterator over the chunks of one table.
    type Chunks: Iterator<Item = Result<Chunk, AnalysisError>>;

    /// Open the table of `subject`. Missing tables fail here; schema
    /// problems surface on the first chunk.
    fn chunks(&self, subject: &str, chunk_size: usize) -> Result<Self::Chunks, AnalysisError>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &S {
    type Chunks = S::Chunks;

    fn chunks(&self, subject: &str, chunk_size: usize) -> Result<Self::Chunks, AnalysisError> {
        (**self).chunks(subject, chunk_size)
    }
}

/// Reads `{subject}_whole_df.csv` files from a data folder.
#[derive(Debug, Clone)]
pub struct CsvChunkSource {
    data_dir: PathBuf,
}

impl CsvChunkSource {
    /// Create a new source over a data folder.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Path of a subject's table.
    pub fn table_path(&self, subject: &str) -> PathBuf {
        self.data_dir.join(format!("{}{}", subject, TABLE_SUFFIX))
    }

    /// Pair each subject with the size of its table, or `None` when missing.
    pub fn availability(&self, subjects: &[String]) -> Vec<(String, Option<u64>)> {
        subjects
            .iter()
            .map(|subject| {
                let size = std::fs::metadata(self.table_path(subject))
                    .ok()
                    .filter(|m| m.is_file())
                    .map(|m| m.len());
                (subject.clone(), size)
            })
            .collect()
    }
}

impl ChunkSource for CsvChunkSource {
    type Chunks = CsvChunks<File>;

    fn chunks(&self, subject: &str, chunk_size: usize) -> Result<Self::Chunks, AnalysisError> {
        let path = self.table_path(subject);

        if !path.is_file() {
            return Err(AnalysisError::NotFound {
                subject: subject.to_string(),
                path,
            });
        }

        let file = File::open(&path)?;
        debug!("Opened {} (chunk size {})", path.display(), chunk_size);
        Ok(CsvChunks::from_reader(file, path, chunk_size))
    }
}

/// Column positions of the analyzed fields.
#[derive(Debug, Clone, Copy)]
struct Columns {
    hr: usize,
    temp: usize,
    stage: usize,
    width: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord, path: &Path) -> Result<Self, AnalysisError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        match (find(HR_COLUMN), find(TEMP_COLUMN), find(STAGE_COLUMN)) {
            (Some(hr), Some(temp), Some(stage)) => Ok(Self {
                hr,
                temp,
                stage,
                width: headers.len(),
            }),
            (hr, temp, stage) => {
                let missing = [
                    (hr, HR_COLUMN),
                    (temp, TEMP_COLUMN),
                    (stage, STAGE_COLUMN),
                ]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name)
                .collect();

                Err(AnalysisError::Schema {
                    path: path.to_path_buf(),
                    missing,
                })
            }
        }
    }
}

/// Forward-only chunk cursor over one CSV table.
///
/// Once an error has been yielded, or the table is exhausted, the cursor
/// yields nothing more.
pub struct CsvChunks<R> {
    reader: csv::Reader<R>,
    path: PathBuf,
    chunk_size: usize,
    columns: Option<Columns>,
    record: StringRecord,
    rows_read: u64,
    done: bool,
}

impl<R: Read> CsvChunks<R> {
    /// Wrap any reader producing CSV text with a header row.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        Self {
            reader,
            path: path.into(),
            chunk_size: chunk_size.max(1),
            columns: None,
            record: StringRecord::new(),
            rows_read: 0,
            done: false,
        }
    }

    fn columns(&mut self) -> Result<Columns, AnalysisError> {
        if let Some(columns) = self.columns {
            return Ok(columns);
        }

        let headers = self.reader.headers()?;
        let columns = Columns::resolve(headers, &self.path)?;
        self.columns = Some(columns);
        Ok(columns)
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>, AnalysisError> {
        let columns = self.columns()?;
        let mut chunk = Chunk::with_capacity(self.chunk_size.min(64 * 1024));

        while chunk.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                self.done = true;
                break;
            }
            self.rows_read += 1;

            // short rows read as missing cells, long rows are malformed
            if self.record.len() > columns.width {
                return Err(AnalysisError::ExtraFields {
                    path: self.path.clone(),
                    row: self.rows_read,
                    expected: columns.width,
                    found: self.record.len(),
                });
            }

            let hr = self.number(columns.hr, HR_COLUMN)?;
            let temp = self.number(columns.temp, TEMP_COLUMN)?;
            let stage = label(self.record.get(columns.stage));
            chunk.push(hr, temp, stage);
        }

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    fn number(&self, idx: usize, column: &'static str) -> Result<Option<f64>, AnalysisError> {
        let raw = self.record.get(idx).unwrap_or("").trim();

        if NA_VALUES.contains(&raw) {
            return Ok(None);
        }

        raw.parse::<f64>()
            .map(Some)
            .map_err(|_| AnalysisError::InvalidValue {
                path: self.path.clone(),
                row: self.rows_read,
                column,
                value: raw.to_string(),
            })
    }
}

impl<R: Read> Iterator for CsvChunks<R> {
    type Item = Result<Chunk, AnalysisError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Sleep-stage label with missing markers folded to the empty label.
fn label(raw: Option<&str>) -> &str {
    let value = raw.unwrap_or("").trim();
    if NA_VALUES.contains(&value) {
        ""
    } else {
        value
    }
}
