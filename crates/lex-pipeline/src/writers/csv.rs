//! Delimited-file writer.

use crate::components::{FromParams, Writer};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{text_encoding, timestamp, with_suffix};
use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use polars::prelude::{CsvWriter as PolarsCsvWriter, PolarsResult, SerWriter};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes the table to one delimited file under an output directory.
///
/// The directory is created when missing. Without a file name the output is
/// called `data_<timestamp>.csv`; with `use_timestamp` the timestamp is
/// inserted before the extension of the configured name.
///
/// Output in an encoding other than UTF-8 is encoded after formatting; a
/// value the encoding cannot represent fails the write.
pub struct CsvWriter {
    output_dir: PathBuf,
    filename: Option<String>,
    use_timestamp: bool,
    encoding: &'static Encoding,
    separator: u8,
    include_header: bool,
    quote_char: u8,
}

impl CsvWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename: None,
            use_timestamp: false,
            encoding: UTF_8,
            separator: b',',
            include_header: true,
            quote_char: b'"',
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn use_timestamp(mut self, use_timestamp: bool) -> Self {
        self.use_timestamp = use_timestamp;
        self
    }

    /// Text encoding of the written file.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn include_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn quote_char(mut self, quote_char: u8) -> Self {
        self.quote_char = quote_char;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The path the next write goes to. Timestamps are taken at call time.
    pub fn output_path(&self) -> PathBuf {
        let filename = match &self.filename {
            None => format!("data_{}.csv", timestamp()),
            Some(name) if self.use_timestamp => with_suffix(name, &timestamp()),
            Some(name) => name.clone(),
        };
        self.output_dir.join(filename)
    }

    fn format<W: Write>(&self, sink: W, table: &mut Table) -> PolarsResult<()> {
        PolarsCsvWriter::new(sink)
            .include_header(self.include_header)
            .with_separator(self.separator)
            .with_quote_char(self.quote_char)
            .finish(table)
    }

    fn encode(&self, table: &mut Table) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.format(&mut buffer, table)?;
        let text = String::from_utf8(buffer).context("formatted table is not valid UTF-8")?;

        let (bytes, _, unmappable) = self.encoding.encode(&text);
        if unmappable {
            anyhow::bail!(
                "table contains characters that {} cannot represent",
                self.encoding.name()
            );
        }
        Ok(bytes.into_owned())
    }
}

impl Writer for CsvWriter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn write(&self, input: &Table) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("cannot create {}", self.output_dir.display()))?;

        let path = self.output_path();
        let mut table = input.clone();

        if self.encoding == UTF_8 {
            let mut file =
                File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
            self.format(&mut file, &mut table)
                .with_context(|| format!("cannot write {}", path.display()))?;
        } else {
            let bytes = self.encode(&mut table)?;
            fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
        }

        info!(
            path = %path.display(),
            rows = table.height(),
            columns = table.width(),
            encoding = self.encoding.name(),
            "Data written"
        );
        Ok(())
    }
}

impl FromParams for CsvWriter {
    const NAME: &'static str = "CsvWriter";
    const DESCRIPTION: &'static str = "Writes the table to a delimited file";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let encoding = text_encoding("encoding", params.str_or("encoding", "utf-8")?)?;

        let mut writer = CsvWriter::new(params.str_or("output_dir", "output")?)
            .encoding(encoding)
            .use_timestamp(params.bool_or("use_timestamp", false)?)
            .separator(params.u8_char_or("separator", b',')?)
            .include_header(params.bool_or("include_header", true)?)
            .quote_char(params.u8_char_or("quote_char", b'"')?);

        if let Some(filename) = params.str("filename")? {
            if filename.trim().is_empty() {
                return Err(ParamError::invalid_value("filename", "must not be empty").into());
            }
            writer = writer.filename(filename);
        }
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use super::CsvWriter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/output");
        let df = df!("id" => [1i64, 2], "name" => ["a", "b"]).unwrap();

        CsvWriter::new(&output).filename("out.csv").write(&df).unwrap();

        let content = fs::read_to_string(output.join("out.csv")).unwrap();
        assert_eq!(content, "id,name\n1,a\n2,b\n");
    }

    #[test]
    fn test_write_without_header_with_separator() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("id" => [1i64], "name" => ["a"]).unwrap();

        CsvWriter::new(dir.path())
            .filename("out.tsv")
            .separator(b'\t')
            .include_header(false)
            .write(&df)
            .unwrap();

        let content = fs::read_to_string(dir.path().join("out.tsv")).unwrap();
        assert_eq!(content, "1\ta\n");
    }

    #[test]
    fn test_default_filename_is_timestamped() {
        let writer = CsvWriter::new("output");
        let name = writer.output_path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("data_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_use_timestamp_keeps_extension() {
        let writer = CsvWriter::new("output").filename("report.csv").use_timestamp(true);
        let name = writer.output_path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".csv"));
        assert_ne!(name, "report.csv");
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("id" => Vec::<i64>::new()).unwrap();

        CsvWriter::new(dir.path()).filename("empty.csv").write(&df).unwrap();

        let content = fs::read_to_string(dir.path().join("empty.csv")).unwrap();
        assert_eq!(content.trim(), "id");
    }

    #[test]
    fn test_write_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("name" => ["Jos\u{e9}"], "city" => ["K\u{f6}ln"]).unwrap();
        let params = Params::new()
            .with("output_dir", dir.path().to_str().unwrap())
            .with("filename", "cities.csv")
            .with("encoding", "latin1");

        CsvWriter::from_params(&params).unwrap().write(&df).unwrap();

        let bytes = fs::read(dir.path().join("cities.csv")).unwrap();
        assert_eq!(bytes, b"name,city\nJos\xe9,K\xf6ln\n".to_vec());
    }

    #[test]
    fn test_unrepresentable_character_fails() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("name" => ["\u{4e2d}\u{6587}"]).unwrap();

        let err = CsvWriter::new(dir.path())
            .filename("out.csv")
            .encoding(encoding_rs::WINDOWS_1252)
            .write(&df)
            .unwrap_err();
        assert!(err.to_string().contains("cannot represent"));
    }

    #[test]
    fn test_from_params() {
        let params = Params::new()
            .with("output_dir", "out")
            .with("filename", "result.csv")
            .with("separator", ";");
        let writer = CsvWriter::from_params(&params).unwrap();
        assert_eq!(writer.output_path(), Path::new("out/result.csv"));
        assert_eq!(writer.separator, b';');

        assert!(CsvWriter::from_params(&Params::new().with("encoding", "klingon")).is_err());
        assert!(CsvWriter::from_params(&Params::new().with("filename", "")).is_err());
    }
}
