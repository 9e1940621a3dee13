//! Tabular output artifacts: CSV with a header row, or a JSON array of objects.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    /// Format implied by the file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn format_of(path: &Path) -> Result<TableFormat> {
    match TableFormat::from_path(path) {
        Some(format) => Ok(format),
        None => bail!(
            "unsupported table format for {} (expected .csv or .json)",
            path.display()
        ),
    }
}

pub fn read_table(path: &Path) -> Result<Table> {
    let table = match format_of(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Json => read_json(path),
    };
    table.with_context(|| format!("failed to read table: {}", path.display()))
}

pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    let written = match format_of(path)? {
        TableFormat::Csv => write_csv(table, path),
        TableFormat::Json => write_json(table, path),
    };
    written.with_context(|| format!("failed to write table: {}", path.display()))
}

// ── CSV ──────────────────────────────────────────────────────────────

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ── JSON ─────────────────────────────────────────────────────────────

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_json(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file))?;
    let Value::Array(items) = value else {
        bail!("expected a JSON array of objects");
    };

    let mut headers: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            bail!("expected a JSON array of objects");
        };
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        objects.push(map);
    }

    let rows: Vec<Vec<String>> = objects
        .iter()
        .map(|map| {
            headers
                .iter()
                .map(|h| map.get(h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Table { headers, rows })
}

fn write_json(table: &Table, path: &Path) -> Result<()> {
    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut map = Map::new();
            for (i, header) in table.headers.iter().enumerate() {
                let cell = row.get(i).cloned().unwrap_or_default();
                map.insert(header.clone(), Value::String(cell));
            }
            Value::Object(map)
        })
        .collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
