//! CSV ingestion: file bytes into raw header → value rows.
//!
//! Spreadsheet exports arrive as UTF-8 or latin-1, comma or semicolon
//! separated, with ragged rows. Cells that are not valid UTF-8 are decoded
//! byte-for-byte as latin-1. A header repeated in the same file gets an
//! ordinal key (`status`, `status#2`) so no cell is lost.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context;
use csv::{ByteRecord, ReaderBuilder};
use serde::Serialize;

use demandas_core::RawRow;
use demandas_core::normalize::repeated_header_key;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub rows: usize,
    pub latin1_cells: usize,
    /// Columns whose header already appeared earlier in the file.
    pub repeated_headers: usize,
    pub delimiter: char,
}

/// Pick `;` when the header line has more semicolons than commas.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let header = sample.split(|&b| b == b'\n').next().unwrap_or_default();
    let commas = header.iter().filter(|&&b| b == b',').count();
    let semicolons = header.iter().filter(|&&b| b == b';').count();
    if semicolons > commas { b';' } else { b',' }
}

fn decode(bytes: &[u8], latin1_cells: &mut usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            *latin1_cells += 1;
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Read every data row. Cells past the header width are dropped; short
/// rows simply lack the trailing columns.
pub fn read_rows<R: Read>(reader: R, delimiter: u8) -> Result<(Vec<RawRow>, IngestStats), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut latin1_cells = 0usize;
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut repeated_headers = 0usize;
    // `None` marks a blank header; its cells are skipped.
    let headers: Vec<Option<String>> = rdr
        .byte_headers()?
        .iter()
        .map(|h| {
            let header = decode(h, &mut latin1_cells)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string();
            if header.is_empty() {
                return None;
            }
            let seen = occurrences.entry(header.clone()).or_default();
            *seen += 1;
            if *seen > 1 {
                repeated_headers += 1;
            }
            Some(repeated_header_key(&header, *seen))
        })
        .collect();

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record)? {
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter_map(|(header, cell)| {
                let header = header.as_ref()?;
                Some((header.clone(), decode(cell, &mut latin1_cells)))
            })
            .collect();
        rows.push(row);
    }

    let stats = IngestStats {
        rows: rows.len(),
        latin1_cells,
        repeated_headers,
        delimiter: char::from(delimiter),
    };
    Ok((rows, stats))
}

/// Read a CSV file, sniffing the delimiter unless one is given.
pub fn read_csv_file(path: &Path, delimiter: Option<u8>) -> anyhow::Result<(Vec<RawRow>, IngestStats)> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?)
        .read_to_end(&mut bytes)
        .with_context(|| format!("reading {}", path.display()))?;

    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&bytes));
    let (rows, stats) =
        read_rows(bytes.as_slice(), delimiter).with_context(|| format!("parsing {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        rows = stats.rows,
        latin1_cells = stats.latin1_cells,
        repeated_headers = stats.repeated_headers,
        delimiter = %stats.delimiter,
        "read CSV"
    );
    Ok((rows, stats))
}
