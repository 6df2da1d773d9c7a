//! Delimited-file loader.

use crate::components::{FromParams, Loader};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{text_encoding, wildcard_to_regex};
use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use polars::prelude::*;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column added to every loaded row, holding the file name it came from.
pub const SOURCE_COLUMN: &str = "source_file";

/// Reads every file in a directory whose name matches a wildcard pattern and
/// concatenates them into one table.
///
/// Files are read in name order. Columns are unioned across files; cells
/// missing from a file are null. A file that cannot be parsed is logged and
/// skipped. A missing directory yields an empty table.
///
/// Files in an encoding other than UTF-8 are decoded before parsing;
/// malformed sequences become U+FFFD.
pub struct CsvLoader {
    input_dir: PathBuf,
    file_pattern: String,
    encoding: &'static Encoding,
    utf8_policy: CsvEncoding,
    separator: u8,
    has_header: bool,
    columns: Option<Vec<String>>,
    add_source_column: bool,
}

impl CsvLoader {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            file_pattern: "*.csv".to_string(),
            encoding: UTF_8,
            utf8_policy: CsvEncoding::Utf8,
            separator: b',',
            has_header: true,
            columns: None,
            add_source_column: true,
        }
    }

    /// Set the wildcard pattern (`*` and `?`) file names must match.
    pub fn file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Keep only these columns from each file.
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn add_source_column(mut self, add: bool) -> Self {
        self.add_source_column = add;
        self
    }

    /// Text encoding of the input files.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replace invalid UTF-8 sequences instead of failing on them.
    pub fn lossy_utf8(mut self, lossy: bool) -> Self {
        self.utf8_policy = if lossy {
            CsvEncoding::LossyUtf8
        } else {
            CsvEncoding::Utf8
        };
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Files in the input directory matching the pattern, sorted by name.
    pub fn matching_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let matcher = wildcard_to_regex(&self.file_pattern)
            .with_context(|| format!("invalid file pattern '{}'", self.file_pattern))?;

        let entries = fs::read_dir(&self.input_dir)
            .with_context(|| format!("cannot list {}", self.input_dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matcher.is_match(name));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> anyhow::Result<DataFrame> {
        let options = CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_infer_schema_length(Some(1000))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(self.separator)
                    .with_encoding(self.utf8_policy),
            );

        let df = if self.encoding == UTF_8 {
            options
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?
        } else {
            let bytes = fs::read(path)?;
            let (text, _, malformed) = self.encoding.decode(&bytes);
            if malformed {
                warn!(
                    file = %path.display(),
                    encoding = self.encoding.name(),
                    "Malformed input replaced while decoding"
                );
            }
            options
                .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
                .finish()?
        };

        match &self.columns {
            Some(columns) => Ok(df.select(columns.iter().cloned())?),
            None => Ok(df),
        }
    }
}

impl Loader for CsvLoader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn load(&self) -> anyhow::Result<Table> {
        if !self.input_dir.exists() {
            warn!(input_dir = %self.input_dir.display(), "Input directory does not exist, creating it");
            if let Err(e) = fs::create_dir_all(&self.input_dir) {
                warn!(input_dir = %self.input_dir.display(), "Could not create input directory: {}", e);
            }
            return Ok(DataFrame::empty());
        }

        let files = self.matching_files()?;
        if files.is_empty() {
            warn!(
                input_dir = %self.input_dir.display(),
                pattern = %self.file_pattern,
                "No files matched"
            );
            return Ok(DataFrame::empty());
        }
        info!(count = files.len(), pattern = %self.file_pattern, "Found files to load");

        let mut frames = Vec::with_capacity(files.len());
        for path in &files {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.read_file(path) {
                Ok(df) => {
                    debug!(file = %file_name, rows = df.height(), columns = df.width(), "Loaded file");
                    let mut lf = df.lazy();
                    if self.add_source_column {
                        lf = lf.with_column(lit(file_name).alias(SOURCE_COLUMN));
                    }
                    frames.push(lf);
                }
                Err(e) => warn!(file = %file_name, "Skipping unreadable file: {}", e),
            }
        }

        if frames.is_empty() {
            warn!("No file could be read");
            return Ok(DataFrame::empty());
        }

        let table = concat_lf_diagonal(frames, UnionArgs::default())?.collect()?;
        info!(rows = table.height(), columns = table.width(), "Loaded data");
        Ok(table)
    }
}

impl FromParams for CsvLoader {
    const NAME: &'static str = "CsvLoader";
    const DESCRIPTION: &'static str = "Loads and concatenates delimited files from a directory";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let pattern = params.str_or("file_pattern", "*.csv")?;
        wildcard_to_regex(pattern)
            .map_err(|e| ParamError::invalid_value("file_pattern", e.to_string()))?;

        let label = params.str_or("encoding", "utf-8")?;
        let (encoding, lossy) = match label.to_ascii_lowercase().as_str() {
            "utf8-lossy" | "utf-8-lossy" => (UTF_8, true),
            _ => (text_encoding("encoding", label)?, false),
        };

        let mut loader = CsvLoader::new(params.str_or("input_dir", "data")?)
            .file_pattern(pattern)
            .encoding(encoding)
            .lossy_utf8(lossy)
            .separator(params.u8_char_or("separator", b',')?)
            .has_header(params.bool_or("has_header", true)?)
            .add_source_column(params.bool_or("add_source_column", true)?);

        if let Some(columns) = params.string_list("columns")? {
            loader = loader.columns(columns);
        }
        Ok(loader)
    }
}
