//! CSV sheet I/O: read the input batch, write the three output partitions.
//!
//! The main output carries every row in input order with LONG / LATTs /
//! Comments columns appended; `_failed` and `_skipped` side files are only
//! written when their partition is non-empty.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs;
use tracing::info;

use crate::batch::runner::BatchReport;
use crate::domain::RowRecord;

/// Recognized spellings of the map-link column, lowercased.
const MAP_COLUMN_NAMES: &[&str] = &[
    "map link",
    "maps link",
    "maps",
    "map",
    "map links",
    "maps links",
    "map_link",
    "maps_link",
    "maplink",
    "mapslink",
];

/// Recognized spellings of the name column, lowercased.
const NAME_COLUMN_NAMES: &[&str] = &["name", "store name", "store", "title", "business name"];

/// A parsed input sheet.
#[derive(Debug)]
pub struct InputBatch {
    pub header: Vec<String>,
    pub rows: Vec<RowRecord>,
    pub map_column: usize,
    pub name_column: Option<usize>,
}

/// Read and parse the input CSV. Fails when the file cannot be read or no
/// map-link column can be located.
pub async fn read_csv(path: &Path) -> Result<InputBatch> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file {}", path.display()))?;

    let mut records = parse_csv(&content);
    if records.is_empty() {
        bail!("Input file {} is empty", path.display());
    }

    let header = records.remove(0);

    let map_column = header
        .iter()
        .position(|name| MAP_COLUMN_NAMES.contains(&name.trim().to_lowercase().as_str()))
        .with_context(|| {
            format!(
                "No map link column found in {} (columns: {})",
                path.display(),
                header.join(", ")
            )
        })?;

    let name_column = header
        .iter()
        .position(|name| NAME_COLUMN_NAMES.contains(&name.trim().to_lowercase().as_str()));

    let rows = records
        .into_iter()
        .enumerate()
        .map(|(index, values)| {
            let cell = |column: usize| {
                values
                    .get(column)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            };
            RowRecord {
                index,
                name: name_column.and_then(cell),
                map_link: cell(map_column),
                values,
            }
        })
        .collect::<Vec<_>>();

    info!(
        path = %path.display(),
        rows = rows.len(),
        map_column = %header[map_column],
        "loaded input sheet"
    );

    Ok(InputBatch {
        header,
        rows,
        map_column,
        name_column,
    })
}

/// Write the main output plus the `_failed` / `_skipped` side files.
pub async fn write_partitions(
    output: &Path,
    header: &[String],
    report: &BatchReport,
) -> Result<()> {
    let mut out_header: Vec<String> = header.to_vec();
    out_header.extend(["LONG", "LATTs", "Comments"].map(String::from));

    let main = render_rows(&out_header, report.all_rows());
    fs::write(output, main)
        .await
        .with_context(|| format!("Failed to write output file {}", output.display()))?;
    info!(path = %output.display(), rows = report.stats.total, "wrote output sheet");

    for (suffix, partition) in [("_failed", &report.failed), ("_skipped", &report.skipped)] {
        if partition.is_empty() {
            continue;
        }
        let path = sibling_with_suffix(output, suffix);
        let body = render_rows(&out_header, partition.iter().collect());
        fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write partition file {}", path.display()))?;
        info!(path = %path.display(), rows = partition.len(), "wrote partition sheet");
    }

    Ok(())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("csv");
    path.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn render_rows(header: &[String], rows: Vec<&crate::batch::runner::ProcessedRow>) -> String {
    let mut out = String::new();
    write_record(&mut out, header.iter().map(String::as_str));

    let width = header.len().saturating_sub(3);
    for row in rows {
        let mut values: Vec<String> = row.record.values.clone();
        values.resize(width, String::new());

        let (long, lat) = row
            .outcome
            .result
            .map(|coord| (coord.longitude.to_string(), coord.latitude.to_string()))
            .unwrap_or_default();
        values.push(long);
        values.push(lat);
        values.push(row.outcome.comment.clone());

        write_record(&mut out, values.iter().map(String::as_str));
    }
    out
}

fn write_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&quote_field(field));
    }
    out.push('\n');
}

fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Quote-aware CSV parse. Handles embedded commas, doubled quotes, and
/// newlines inside quoted fields; tolerates both \n and \r\n endings.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    // Drop fully blank trailing lines.
    records.retain(|record| !(record.len() == 1 && record[0].is_empty()));
    records
}
