//! Flatten a validated harvest into records and write them out.

use crate::config::{HarvestPlan, OutputConfig};
use crate::models::{Harvest, Record, SeriesMapping, TableMapping};
use crate::tooltip::cleaner::parse_date;
use anyhow::{Context, Result, bail};
use std::io::Write;
use tracing::debug;

const SERIES_DATE: &str = "date";
const SERIES_VALUE: &str = "value";

// ── Normalizer ────────────────────────────────────────────────────────────────

/// Records plus the column order they should be written in.
pub struct RecordSet<'a> {
    pub headers: Vec<String>,
    pub records: Box<dyn Iterator<Item = Record> + 'a>,
}

pub struct Normalizer {
    date_format: String,
    row_header: String,
    row_date_formats: Vec<String>,
    noise_key: String,
}

impl Normalizer {
    pub fn new(plan: &HarvestPlan, output: &OutputConfig) -> Self {
        let (row_header, row_date_formats, noise_key) = match plan {
            HarvestPlan::ChartSweep(_) => (SERIES_DATE.to_string(), Vec::new(), String::new()),
            HarvestPlan::TableScroll(p) => (
                p.output.row_header.clone(),
                p.output.row_date_formats.clone(),
                p.shape.noise_key.clone(),
            ),
            HarvestPlan::GridProbe(p) => (
                p.output.row_header.clone(),
                p.output.row_date_formats.clone(),
                p.shape.noise_key.clone(),
            ),
        };
        Self {
            date_format: output.date_format.clone(),
            row_header,
            row_date_formats,
            noise_key,
        }
    }

    pub fn normalize<'a>(&'a self, harvest: &'a Harvest) -> RecordSet<'a> {
        match harvest {
            Harvest::Series(series) => self.series(series),
            Harvest::Table(table) => self.table(table),
        }
    }

    /// `{date, value}` per distinct day, in chronological order.
    fn series<'a>(&'a self, series: &'a SeriesMapping) -> RecordSet<'a> {
        let records = series.iter().map(move |(date, value)| {
            Record::default()
                .with(SERIES_DATE, date.format(&self.date_format).to_string())
                .with(SERIES_VALUE, value.clone())
        });
        RecordSet {
            headers: vec![SERIES_DATE.to_string(), SERIES_VALUE.to_string()],
            records: Box::new(records),
        }
    }

    /// `{row key, ...columns}` per row in encounter order, noise row dropped.
    fn table<'a>(&'a self, table: &'a TableMapping) -> RecordSet<'a> {
        let mut headers = vec![self.row_header.clone()];
        for (_, columns) in self.real_rows(table) {
            for column in columns.keys() {
                if !headers.contains(column) {
                    headers.push(column.clone());
                }
            }
        }

        let records = self.real_rows(table).map(move |(key, columns)| {
            columns.iter().fold(
                Record::default().with(self.row_header.clone(), self.row_key(key)),
                |record, (column, value)| record.with(column.clone(), value.clone()),
            )
        });
        RecordSet { headers, records: Box::new(records) }
    }

    fn real_rows<'a>(
        &'a self,
        table: &'a TableMapping,
    ) -> impl Iterator<Item = (&'a str, &'a indexmap::IndexMap<String, String>)> + 'a {
        table.rows().filter(move |(key, _)| *key != self.noise_key)
    }

    fn row_key(&self, key: &str) -> String {
        if self.row_date_formats.is_empty() {
            return key.to_string();
        }
        match parse_date(key, &self.row_date_formats) {
            Some(date) => date.format(&self.date_format).to_string(),
            None => {
                debug!("row key {:?} is not a date; kept as-is", key);
                key.to_string()
            }
        }
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Destination for flat records: `open` once with the column order, then
/// `write_record` per record, then `close` after the last one.
pub trait RecordSink {
    fn open(&mut self, headers: &[String]) -> Result<()>;
    fn write_record(&mut self, record: &Record) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Row-oriented CSV; columns a record lacks are written empty.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    headers: Option<Vec<String>>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(inner),
            headers: None,
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("CSV flush failed")
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn open(&mut self, headers: &[String]) -> Result<()> {
        self.writer.write_record(headers).context("CSV header write failed")?;
        self.headers = Some(headers.to_vec());
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        let Some(headers) = &self.headers else {
            bail!("CSV sink written before open");
        };
        let row: Vec<&str> = headers.iter().map(|h| record.get(h).unwrap_or("")).collect();
        self.writer.write_record(&row).context("CSV row write failed")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush().context("CSV flush failed")?;
        Ok(())
    }
}

/// Drain the records into the sink, then close it. Returns the record count.
pub fn emit(set: RecordSet<'_>, sink: &mut dyn RecordSink) -> Result<usize> {
    sink.open(&set.headers)?;
    let mut written = 0usize;
    for record in set.records {
        sink.write_record(&record)?;
        written += 1;
    }
    sink.close()?;
    Ok(written)
}
