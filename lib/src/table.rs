//! Column-named jet tables.
//!
//! A [`JetTable`] is the flat representation every stage after flattening
//! works on: named `f32` feature columns stored row-major, plus named
//! boolean label columns (`is_data`, `is_quark`).

use crate::error::{QgError, Result};
use crate::serialization::{load_bincode, save_bincode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A named boolean column attached to every row of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelColumn {
    pub name: String,
    pub values: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetTable {
    columns: Vec<String>,
    data: Vec<f32>,
    rows: usize,
    labels: Vec<LabelColumn>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect()
}

impl JetTable {
    /// Empty table with the given feature columns.
    pub fn new(columns: Vec<String>) -> Self {
        let index = build_index(&columns);
        Self {
            columns,
            data: Vec::new(),
            rows: 0,
            labels: Vec::new(),
            index,
        }
    }

    /// Table from row-major data.
    pub fn from_rows(columns: Vec<String>, data: Vec<f32>) -> Result<Self> {
        let width = columns.len();
        if width == 0 {
            if !data.is_empty() {
                return Err(QgError::FeatureMismatch {
                    expected: 0,
                    got: data.len(),
                });
            }
        } else if data.len() % width != 0 {
            return Err(QgError::FeatureMismatch {
                expected: width,
                got: data.len() % width,
            });
        }
        let rows = if width == 0 { 0 } else { data.len() / width };
        let mut table = Self::new(columns);
        table.data = data;
        table.rows = rows;
        Ok(table)
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(QgError::FeatureMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        if !self.labels.is_empty() {
            return Err(QgError::InvalidParameter(
                "cannot append rows to a labelled table".into(),
            ));
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| QgError::UnknownColumn(name.to_string()))
    }

    /// Copies one feature column out of the table.
    pub fn column(&self, name: &str) -> Result<Vec<f32>> {
        let c = self.column_index(name)?;
        Ok(self.rows_iter().map(|row| row[c]).collect())
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let w = self.columns.len();
        &self.data[i * w..(i + 1) * w]
    }

    pub(crate) fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let w = self.columns.len();
        &mut self.data[i * w..(i + 1) * w]
    }

    pub fn rows_iter(&self) -> impl Iterator<Item = &[f32]> {
        let w = self.columns.len().max(1);
        self.data.chunks_exact(w)
    }

    /// Row-major storage.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Adds (or replaces) a label column set to `value` for every row.
    pub fn with_label(mut self, name: &str, value: bool) -> Self {
        let values = vec![value; self.rows];
        match self.labels.iter_mut().find(|l| l.name == name) {
            Some(label) => label.values = values,
            None => self.labels.push(LabelColumn {
                name: name.to_string(),
                values,
            }),
        }
        self
    }

    pub fn drop_label(&mut self, name: &str) -> Result<()> {
        let before = self.labels.len();
        self.labels.retain(|l| l.name != name);
        if self.labels.len() == before {
            return Err(QgError::UnknownLabel(name.to_string()));
        }
        Ok(())
    }

    pub fn labels(&self) -> &[LabelColumn] {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Result<&[bool]> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.values.as_slice())
            .ok_or_else(|| QgError::UnknownLabel(name.to_string()))
    }

    /// A label as `0.0` / `1.0` training targets.
    pub fn targets(&self, name: &str) -> Result<Vec<f32>> {
        Ok(self
            .label(name)?
            .iter()
            .map(|&b| if b { 1.0 } else { 0.0 })
            .collect())
    }

    /// Stacks tables with identical feature columns and label names.
    pub fn concat(tables: &[JetTable]) -> Result<JetTable> {
        let first = tables
            .first()
            .ok_or_else(|| QgError::EmptyData("no tables to concatenate".into()))?;
        let label_names: Vec<&str> = first.labels.iter().map(|l| l.name.as_str()).collect();

        let mut out = JetTable::new(first.columns.clone());
        out.labels = label_names
            .iter()
            .map(|n| LabelColumn {
                name: n.to_string(),
                values: Vec::new(),
            })
            .collect();

        for table in tables {
            if table.columns != first.columns {
                return Err(QgError::FeatureMismatch {
                    expected: first.columns.len(),
                    got: table.columns.len(),
                });
            }
            let names: Vec<&str> = table.labels.iter().map(|l| l.name.as_str()).collect();
            if names != label_names {
                return Err(QgError::InvalidParameter(format!(
                    "label columns differ: {label_names:?} vs {names:?}"
                )));
            }
            out.data.extend_from_slice(&table.data);
            out.rows += table.rows;
            for (dst, src) in out.labels.iter_mut().zip(&table.labels) {
                dst.values.extend_from_slice(&src.values);
            }
        }
        Ok(out)
    }

    /// Row-major feature matrix restricted to `variables`, in that order.
    pub fn select(&self, variables: &[String]) -> Result<Vec<f32>> {
        let idx = variables
            .iter()
            .map(|v| self.column_index(v))
            .collect::<Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(self.rows * idx.len());
        for row in self.rows_iter() {
            out.extend(idx.iter().map(|&c| row[c]));
        }
        Ok(out)
    }

    /// Rows `range` as a new table, labels included.
    pub fn slice(&self, range: std::ops::Range<usize>) -> JetTable {
        let w = self.columns.len();
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        let mut out = JetTable::new(self.columns.clone());
        out.data = self.data[start * w..end * w].to_vec();
        out.rows = end - start;
        out.labels = self
            .labels
            .iter()
            .map(|l| LabelColumn {
                name: l.name.clone(),
                values: l.values[start..end].to_vec(),
            })
            .collect();
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_bincode(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut table: JetTable = load_bincode(path)?;
        table.index = build_index(&table.columns);
        Ok(table)
    }

    /// Writes features and labels as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let header: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .chain(self.labels.iter().map(|l| l.name.as_str()))
            .collect();
        writer.write_record(&header)?;
        for (i, row) in self.rows_iter().enumerate() {
            let record: Vec<String> = row
                .iter()
                .map(|v| v.to_string())
                .chain(self.labels.iter().map(|l| l.values[i].to_string()))
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn small() -> JetTable {
        JetTable::from_rows(cols(&["a", "b", "c"]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn test_from_rows_shape() {
        let t = small();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.n_columns(), 3);
        assert_eq!(t.row(1), &[4.0, 5.0, 6.0]);
        assert!(JetTable::from_rows(cols(&["a", "b"]), vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut t = JetTable::new(cols(&["a", "b"]));
        t.push_row(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            t.push_row(&[1.0]),
            Err(QgError::FeatureMismatch { expected: 2, got: 1 })
        ));
        assert_eq!(t.n_rows(), 1);
    }

    #[test]
    fn test_column_lookup() {
        let t = small();
        assert_eq!(t.column("b").unwrap(), vec![2.0, 5.0]);
        assert!(matches!(t.column("z"), Err(QgError::UnknownColumn(_))));
    }

    #[test]
    fn test_select_reorders() {
        let t = small();
        assert_eq!(
            t.select(&cols(&["c", "a"])).unwrap(),
            vec![3.0, 1.0, 6.0, 4.0]
        );
    }

    #[test]
    fn test_labels() {
        let mut t = small().with_label("is_quark", true).with_label("is_data", false);
        assert_eq!(t.label("is_quark").unwrap(), &[true, true]);
        assert_eq!(t.targets("is_data").unwrap(), vec![0.0, 0.0]);

        t.drop_label("is_data").unwrap();
        assert!(matches!(t.label("is_data"), Err(QgError::UnknownLabel(_))));
        assert!(t.drop_label("is_data").is_err());
    }

    #[test]
    fn test_concat_keeps_label_alignment() {
        let a = small().with_label("is_quark", true);
        let b = JetTable::from_rows(cols(&["a", "b", "c"]), vec![7.0, 8.0, 9.0])
            .unwrap()
            .with_label("is_quark", false);

        let both = JetTable::concat(&[a, b]).unwrap();
        assert_eq!(both.n_rows(), 3);
        assert_eq!(both.column("a").unwrap(), vec![1.0, 4.0, 7.0]);
        assert_eq!(both.label("is_quark").unwrap(), &[true, true, false]);
    }

    #[test]
    fn test_concat_rejects_mismatch() {
        let a = small().with_label("is_quark", true);
        let b = small().with_label("is_data", true);
        assert!(JetTable::concat(&[a.clone(), b]).is_err());

        let c = JetTable::from_rows(cols(&["a", "b"]), vec![1.0, 2.0])
            .unwrap()
            .with_label("is_quark", true);
        assert!(JetTable::concat(&[a, c]).is_err());
        assert!(matches!(JetTable::concat(&[]), Err(QgError::EmptyData(_))));
    }

    #[test]
    fn test_slice() {
        let t = small().with_label("is_quark", true);
        let s = t.slice(1..5);
        assert_eq!(s.n_rows(), 1);
        assert_eq!(s.row(0), &[4.0, 5.0, 6.0]);
        assert_eq!(s.label("is_quark").unwrap(), &[true]);
    }

    #[test]
    fn test_save_load_rebuilds_index() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.bin");
        let t = small().with_label("is_data", true);
        t.save(&path).unwrap();

        let loaded = JetTable::load(&path).unwrap();
        assert_eq!(loaded.column("c").unwrap(), vec![3.0, 6.0]);
        assert_eq!(loaded.label("is_data").unwrap(), &[true, true]);
    }

    #[test]
    fn test_write_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.csv");
        small().with_label("is_quark", false).write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("a,b,c,is_quark"));
        assert_eq!(lines.next(), Some("1,2,3,false"));
    }
}
