use crate::error::{SimError, SimResult};
use indexmap::IndexMap;

/// Named columns of `f64` in insertion order, with a row count fixed at
/// construction. Cells start out NaN until written.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    rows: usize,
    columns: IndexMap<String, Vec<f64>>,
}

impl ResultTable {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: IndexMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Appends a NaN-filled column.
    pub fn add_column(&mut self, name: &str) -> SimResult<()> {
        self.with_values(name, vec![f64::NAN; self.rows])
    }

    pub fn with_values(&mut self, name: &str, values: Vec<f64>) -> SimResult<()> {
        if self.columns.contains_key(name) {
            return Err(SimError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows {
            return Err(SimError::LengthMismatch {
                name: name.to_string(),
                got: values.len(),
                rows: self.rows,
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> SimResult<&[f64]> {
        self.columns
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| SimError::MissingColumn(name.to_string()))
    }

    pub fn get(&self, name: &str, row: usize) -> SimResult<f64> {
        self.check_row(row)?;
        Ok(self.column(name)?[row])
    }

    pub fn set(&mut self, name: &str, row: usize, value: f64) -> SimResult<()> {
        self.check_row(row)?;
        let col = self
            .columns
            .get_mut(name)
            .ok_or_else(|| SimError::MissingColumn(name.to_string()))?;
        col[row] = value;
        Ok(())
    }

    /// Writes a set of cells in one row. Every name is checked before the
    /// first cell is touched.
    pub fn write_row(&mut self, row: usize, cells: &[(String, f64)]) -> SimResult<()> {
        self.check_row(row)?;
        if let Some((name, _)) = cells.iter().find(|(n, _)| !self.columns.contains_key(n)) {
            return Err(SimError::MissingColumn(name.clone()));
        }
        for (name, value) in cells {
            if let Some(col) = self.columns.get_mut(name) {
                col[row] = *value;
            }
        }
        Ok(())
    }

    /// Row values in column order.
    pub fn row(&self, row: usize) -> SimResult<Vec<f64>> {
        self.check_row(row)?;
        Ok(self.columns.values().map(|c| c[row]).collect())
    }

    fn check_row(&self, row: usize) -> SimResult<()> {
        if row >= self.rows {
            return Err(SimError::RowOutOfRange { row, rows: self.rows });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ResultTable;
    use crate::error::SimError;

    #[test]
    fn columns_keep_insertion_order() {
        let mut t = ResultTable::new(2);
        t.with_values("couplings", vec![0.0, 1.0]).unwrap();
        t.add_column("gs_energy").unwrap();
        t.add_column("E1").unwrap();
        t.add_column("corr_R_1").unwrap();
        let names: Vec<&str> = t.names().collect();
        assert_eq!(names, vec!["couplings", "gs_energy", "E1", "corr_R_1"]);
    }

    #[test]
    fn bad_row_writes_touch_nothing() {
        let mut t = ResultTable::new(3);
        t.add_column("a").unwrap();
        t.add_column("b").unwrap();
        let err = t
            .write_row(1, &[("a".to_string(), 1.0), ("missing".to_string(), 2.0)])
            .unwrap_err();
        assert!(matches!(err, SimError::MissingColumn(_)));
        assert!(t.get("a", 1).unwrap().is_nan());

        t.write_row(1, &[("a".to_string(), 1.0), ("b".to_string(), 2.0)]).unwrap();
        assert_eq!(t.row(1).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(t.set("a", 3, 0.0), Err(SimError::RowOutOfRange { row: 3, rows: 3 })));
    }

    #[test]
    fn duplicate_and_short_columns_are_rejected() {
        let mut t = ResultTable::new(2);
        t.add_column("a").unwrap();
        assert!(matches!(t.add_column("a"), Err(SimError::DuplicateColumn(_))));
        assert!(matches!(
            t.with_values("b", vec![1.0]),
            Err(SimError::LengthMismatch { got: 1, rows: 2, .. })
        ));
    }
}
