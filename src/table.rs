use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use regex::Regex;
use serde::Serialize;

use crate::error::PrepError;

static IDX_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)idx(\d)-ubyte(\.gz)?$").unwrap());

const IDX_UNSIGNED_BYTE: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Idx,
}

impl TableFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if IDX_NAME.is_match(name) {
            return Some(TableFormat::Idx);
        }
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") || lower.ends_with(".csv.gz") {
            return Some(TableFormat::Csv);
        }
        None
    }
}

/// In-memory rows of string cells under a header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|header| header == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

/// A decoded IDX file: the dimension sizes and the flat unsigned-byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxArray {
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

impl IdxArray {
    pub fn items(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Values per item, e.g. 784 for 28x28 images and 1 for labels.
    pub fn item_len(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    pub fn item(&self, index: usize) -> Option<&[u8]> {
        let len = self.item_len();
        let start = index.checked_mul(len)?;
        self.data.get(start..start.checked_add(len)?)
    }

    pub fn into_table(self) -> Table {
        let len = self.item_len();
        let headers = if self.dims.len() == 1 {
            vec!["label".to_string()]
        } else {
            (0..len).map(|index| format!("px{index}")).collect()
        };
        let rows = self
            .data
            .chunks(len.max(1))
            .map(|chunk| chunk.iter().map(|value| value.to_string()).collect())
            .collect();
        Table { headers, rows }
    }
}

/// Loads a file into a table, choosing the reader from its extension.
pub fn load_table(path: &Path) -> Result<Table, PrepError> {
    match TableFormat::detect(path) {
        Some(TableFormat::Csv) => read_csv(path),
        Some(TableFormat::Idx) => Ok(read_idx(path)?.into_table()),
        None => Err(PrepError::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn read_csv(path: &Path) -> Result<Table, PrepError> {
    let reader = open_maybe_gz(path)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|err| PrepError::Table(format!("{}: {err}", path.display())))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|err| PrepError::Table(format!("{}: {err}", path.display())))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

pub fn read_idx(path: &Path) -> Result<IdxArray, PrepError> {
    let mut reader = open_maybe_gz(path)?;
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| PrepError::Table(format!("{}: {err}", path.display())))?;
    parse_idx(&bytes).map_err(|message| PrepError::Table(format!("{}: {message}", path.display())))
}

/// Header is two zero bytes, the element type, the dimension count, then one
/// big-endian `u32` per dimension.
pub fn parse_idx(bytes: &[u8]) -> Result<IdxArray, String> {
    if bytes.len() < 4 || bytes[0] != 0 || bytes[1] != 0 {
        return Err("missing IDX magic number".to_string());
    }
    if bytes[2] != IDX_UNSIGNED_BYTE {
        return Err(format!("unsupported IDX element type 0x{:02x}", bytes[2]));
    }
    let ndims = bytes[3] as usize;
    let header_len = 4 + ndims * 4;
    if ndims == 0 || bytes.len() < header_len {
        return Err("truncated IDX header".to_string());
    }
    let dims = bytes[4..header_len]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize)
        .collect::<Vec<_>>();
    let expected = dims
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| format!("IDX dimensions {dims:?} overflow"))?;
    let data = &bytes[header_len..];
    if data.len() != expected {
        return Err(format!(
            "IDX payload has {} bytes, header declares {expected}",
            data.len()
        ));
    }
    Ok(IdxArray {
        dims,
        data: data.to_vec(),
    })
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>, PrepError> {
    let file = File::open(path)
        .map_err(|err| PrepError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}
