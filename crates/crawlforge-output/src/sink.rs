//! Sink abstraction and the CSV implementation.
//!
//! Grounded on `DataSaver` (`scraping/data_saver.py`): `save_csv`'s
//! transpose via `zip(*ordered_data)` becomes [`CsvSink::write`]'s
//! `transpose` helper; `save_txt`/`save_database`'s `NotImplementedError`
//! stubs become [`TxtSink`]/[`DatabaseSink`] returning
//! `CrawlError::Configuration`, per spec.md §4.H's named stub boundary.

use std::fs::OpenOptions;
use std::path::PathBuf;

use crawlforge_types::{CrawlError, Result};

/// One extracted record, one value per entry in the `field_names`
/// slice passed alongside it to [`Sink::write`].
pub type Row = Vec<String>;

/// Horizontal emits one row per field (field name in column 0,
/// values across the rest of the row); vertical transposes so each
/// record is a row and field names form the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "horizontal" => Ok(Orientation::Horizontal),
            "vertical" => Ok(Orientation::Vertical),
            other => Err(CrawlError::configuration(format!(
                "invalid csv orientation '{other}'"
            ))),
        }
    }
}

/// A configured output destination for extracted rows.
pub trait Sink: Send + Sync {
    fn write(&mut self, rows: &[Row], field_names: &[String]) -> Result<()>;
    fn truncate(&mut self) -> Result<()>;
}

/// Writes rows to a CSV file, field-major or record-major depending
/// on `orientation`.
pub struct CsvSink {
    file_path: PathBuf,
    orientation: Orientation,
}

impl CsvSink {
    pub fn new(file_path: impl Into<PathBuf>, orientation: Orientation) -> Self {
        Self {
            file_path: file_path.into(),
            orientation,
        }
    }

    /// `ordered_data[i]` is `[field_names[i], rows[0][i], rows[1][i], ...]`,
    /// mirroring the original's per-key column build before the
    /// orientation-dependent write.
    fn ordered_columns(rows: &[Row], field_names: &[String]) -> Vec<Vec<String>> {
        field_names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let mut column = vec![name.clone()];
                column.extend(rows.iter().map(|row| row.get(idx).cloned().unwrap_or_default()));
                column
            })
            .collect()
    }

    fn transpose(columns: &[Vec<String>]) -> Vec<Vec<String>> {
        let Some(len) = columns.first().map(Vec::len) else {
            return Vec::new();
        };
        (0..len)
            .map(|row_idx| columns.iter().map(|col| col[row_idx].clone()).collect())
            .collect()
    }
}

impl Sink for CsvSink {
    fn write(&mut self, rows: &[Row], field_names: &[String]) -> Result<()> {
        let columns = Self::ordered_columns(rows, field_names);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let rows_to_write: Vec<Vec<String>> = match self.orientation {
            Orientation::Horizontal => columns,
            Orientation::Vertical => Self::transpose(&columns),
        };

        for record in &rows_to_write {
            writer
                .write_record(record)
                .map_err(|e| CrawlError::custom(format!("csv sink error: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| CrawlError::custom(format!("csv sink error: {e}")))?;
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)?;
        Ok(())
    }
}

/// Stub matching the original's `save_txt`: the feature isn't built
/// yet, so every call fails the same way `NotImplementedError` did.
#[derive(Debug, Default)]
pub struct TxtSink;

impl Sink for TxtSink {
    fn write(&mut self, _rows: &[Row], _field_names: &[String]) -> Result<()> {
        Err(CrawlError::configuration("txt sink not yet implemented"))
    }

    fn truncate(&mut self) -> Result<()> {
        Err(CrawlError::configuration("txt sink not yet implemented"))
    }
}

/// Stub matching the original's `save_database`.
#[derive(Debug, Default)]
pub struct DatabaseSink;

impl Sink for DatabaseSink {
    fn write(&mut self, _rows: &[Row], _field_names: &[String]) -> Result<()> {
        Err(CrawlError::configuration("database sink not yet implemented"))
    }

    fn truncate(&mut self) -> Result<()> {
        Err(CrawlError::configuration("database sink not yet implemented"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names() -> Vec<String> {
        vec!["name".to_string(), "price".to_string()]
    }

    fn rows() -> Vec<Row> {
        vec![
            vec!["widget".to_string(), "$5".to_string()],
            vec!["gadget".to_string(), "$9".to_string()],
        ]
    }

    #[test]
    fn horizontal_orientation_writes_one_row_per_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::new(&path, Orientation::Horizontal);
        sink.write(&rows(), &field_names()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "name,widget,gadget");
        assert_eq!(lines.next().unwrap(), "price,$5,$9");
    }

    #[test]
    fn vertical_orientation_transposes_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::new(&path, Orientation::Vertical);
        sink.write(&rows(), &field_names()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "name,price");
        assert_eq!(lines.next().unwrap(), "widget,$5");
        assert_eq!(lines.next().unwrap(), "gadget,$9");
    }

    #[test]
    fn truncate_clears_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale content\n").unwrap();

        let mut sink = CsvSink::new(&path, Orientation::Horizontal);
        sink.truncate().unwrap();
        sink.write(&rows(), &field_names()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
    }

    #[test]
    fn txt_sink_is_an_explicit_stub() {
        let mut sink = TxtSink;
        assert!(sink.write(&[], &[]).is_err());
    }

    #[test]
    fn invalid_orientation_string_is_a_configuration_error() {
        assert!(Orientation::parse("sideways").is_err());
    }
}
