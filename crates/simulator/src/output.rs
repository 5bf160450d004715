use crate::table::ResultTable;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Number formatting for CSV output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsvFormat {
    /// Digits after the decimal point, scientific notation.
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_precision() -> usize {
    12
}

fn default_separator() -> String {
    ",".to_string()
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            separator: default_separator(),
        }
    }
}

impl CsvFormat {
    pub fn value(&self, x: f64) -> String {
        if x.is_nan() {
            "nan".to_string()
        } else {
            format!("{:.*e}", self.precision, x)
        }
    }
}

/// `Z{N}_L_{L}_sector_{s}[_{suffix}].csv`
pub fn output_csv_filename(
    order: usize,
    len: usize,
    sector: usize,
    suffix: Option<&str>,
) -> String {
    match suffix {
        Some(s) if !s.is_empty() => format!("Z{}_L_{}_sector_{}_{}.csv", order, len, sector, s),
        _ => format!("Z{}_L_{}_sector_{}.csv", order, len, sector),
    }
}

pub fn write_csv(path: &Path, table: &ResultTable, fmt: &CsvFormat) -> io::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    let header: Vec<&str> = table.names().collect();
    writeln!(f, "{}", header.join(&fmt.separator))?;
    for row in 0..table.rows() {
        let values = table
            .row(row)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let cells: Vec<String> = values.iter().map(|&x| fmt.value(x)).collect();
        writeln!(f, "{}", cells.join(&fmt.separator))?;
    }
    f.flush()
}
