//! Applying fitted classifiers and scoring them.
//!
//! [`apply`] runs a model over a table in fixed-size chunks and keeps the
//! `(y, p)` pairs as a [`ResultTable`]. The KPI report reads several result
//! tables, prints their ROC AUC and writes the curves.

use crate::backend::{Backend, Tensor1D, Tensor2D};
use crate::dataset::{Dataset, InMemoryDataset};
use crate::error::{QgError, Result};
use crate::model::InferenceModel;
use crate::serialization::{load_bincode, save_bincode};
use crate::table::JetTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rows per forward pass in [`apply`].
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// True labels and predicted scores of one evaluated sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub y: Vec<f32>,
    pub p: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct ResultRow {
    y: f32,
    p: f64,
}

impl ResultTable {
    pub fn new(y: Vec<f32>, p: Vec<f64>) -> Result<Self> {
        if y.len() != p.len() {
            return Err(QgError::FeatureMismatch {
                expected: y.len(),
                got: p.len(),
            });
        }
        Ok(Self { y, p })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn auc(&self) -> Result<f64> {
        roc_auc_score(&self.y, &self.p)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_bincode(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_bincode(path)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (&y, &p) in self.y.iter().zip(&self.p) {
            writer.serialize(ResultRow { y, p })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut table = Self::default();
        for row in reader.deserialize() {
            let row: ResultRow = row?;
            table.y.push(row.y);
            table.p.push(row.p);
        }
        Ok(table)
    }
}

/// Scores every row of `table` with `model`, `chunk_size` rows at a time.
///
/// `variables` selects the model inputs; `label` names the target column.
pub fn apply<B, M>(
    model: &M,
    table: &JetTable,
    variables: &[String],
    label: &str,
    chunk_size: usize,
) -> Result<ResultTable>
where
    B: Backend,
    M: InferenceModel<B, InputBatch = Tensor2D<B>, OutputBatch = Tensor1D<B>>,
{
    if chunk_size == 0 {
        return Err(QgError::InvalidParameter("chunk size must be positive".into()));
    }
    let data = InMemoryDataset::from_table(table, variables, label)?;
    let mut p = Vec::with_capacity(data.len());
    for start in (0..data.len()).step_by(chunk_size) {
        let end = (start + chunk_size).min(data.len());
        let (x, _) = data.get_batch::<B>(start..end)?;
        p.extend(model.predict_batch(&x).to_vec());
        debug!(start, end, "applied chunk");
    }
    ResultTable::new(data.targets().to_vec(), p)
}

/// Receiver operating characteristic.
///
/// One point per distinct score in descending order, preceded by `(0, 0)`
/// at threshold `+∞`.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

#[derive(Serialize)]
struct RocPoint {
    fpr: f64,
    tpr: f64,
    threshold: f64,
}

impl RocCurve {
    /// Trapezoidal area under the curve.
    pub fn area(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for i in 0..self.fpr.len() {
            writer.serialize(RocPoint {
                fpr: self.fpr[i],
                tpr: self.tpr[i],
                threshold: self.thresholds[i],
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn class_counts(y: &[f32], p: &[f64]) -> Result<(usize, usize)> {
    if y.len() != p.len() {
        return Err(QgError::FeatureMismatch {
            expected: y.len(),
            got: p.len(),
        });
    }
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(QgError::InvalidParameter(
            "ROC needs both classes to be present".into(),
        ));
    }
    Ok((positives, negatives))
}

pub fn roc_curve(y: &[f32], p: &[f64]) -> Result<RocCurve> {
    let (positives, negatives) = class_counts(y, p)?;
    if p.iter().any(|v| v.is_nan()) {
        return Err(QgError::Numerical("NaN score".into()));
    }
    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_by(|&a, &b| p[b].total_cmp(&p[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    for (k, &i) in order.iter().enumerate() {
        if y[i] > 0.5 {
            tp += 1;
        } else {
            fp += 1;
        }
        // emit once all rows sharing this score are counted
        let last_of_score = order.get(k + 1).map_or(true, |&j| p[j] != p[i]);
        if last_of_score {
            curve.fpr.push(fp as f64 / negatives as f64);
            curve.tpr.push(tp as f64 / positives as f64);
            curve.thresholds.push(p[i]);
        }
    }
    Ok(curve)
}

/// Area under the ROC curve. Tied scores between classes count one half.
pub fn roc_auc_score(y: &[f32], p: &[f64]) -> Result<f64> {
    Ok(roc_curve(y, p)?.area())
}

/// Maps scores linearly onto `[0, 1]`; constant scores map to 0.
pub fn min_max_normalise(p: &[f64]) -> Vec<f64> {
    let min = p.iter().copied().fold(f64::INFINITY, f64::min);
    let max = p.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range > 0.0) {
        return vec![0.0; p.len()];
    }
    p.iter().map(|v| (v - min) / range).collect()
}

/// One line of the KPI report.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiEntry {
    pub label: String,
    pub auc: f64,
    pub roc: RocCurve,
}

/// Result files shown by default: both samples of the network, with and
/// without boosting, and of the Fisher baseline.
pub fn default_kpi_inputs(dir: &Path) -> Vec<(String, PathBuf)> {
    [
        ("Train with Boost", "result_train_with_boost.bin"),
        ("Test with Boost", "result_test_with_boost.bin"),
        ("Train without Boost", "result_train_without_boost.bin"),
        ("Test without Boost", "result_test_without_boost.bin"),
        ("Fisher Train", "result_train_fisher.bin"),
        ("Fisher Test", "result_test_fisher.bin"),
    ]
    .into_iter()
    .map(|(label, file)| (label.to_string(), dir.join(file)))
    .collect()
}

fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Scores every result file and writes `roc_<label>.csv` into `out_dir`.
///
/// Missing files are skipped with a log line so a partial run still reports.
pub fn kpi_report(inputs: &[(String, PathBuf)], out_dir: &Path) -> Result<Vec<KpiEntry>> {
    std::fs::create_dir_all(out_dir)?;
    let mut entries = Vec::with_capacity(inputs.len());
    for (label, path) in inputs {
        if !path.exists() {
            info!("Skip {label}: {} not found", path.display());
            continue;
        }
        let result = ResultTable::load(path)?;
        let normalised = min_max_normalise(&result.p);
        let roc = roc_curve(&result.y, &normalised)?;
        let auc = roc.area();
        info!("{label} auc {auc:.6}");
        roc.write_csv(&out_dir.join(format!("roc_{}.csv", file_stem(label))))?;
        entries.push(KpiEntry {
            label: label.clone(),
            auc,
            roc,
        });
    }
    Ok(entries)
}

/// Draws all ROC curves of a report into one PNG.
#[cfg(feature = "plotters")]
pub fn plot_roc_curves(entries: &[KpiEntry], path: &Path) -> Result<()> {
    use plotters::prelude::*;

    let plot_err = |e: &dyn std::fmt::Display| QgError::Plot(e.to_string());

    let root = BitMapBackend::new(path, (900, 900)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_err(&e))?;
    let mut chart = ChartBuilder::on(&root)
        .caption("ROC", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)
        .map_err(|e| plot_err(&e))?;
    chart
        .configure_mesh()
        .x_desc("false positive rate")
        .y_desc("true positive rate")
        .draw()
        .map_err(|e| plot_err(&e))?;

    for (i, entry) in entries.iter().enumerate() {
        let colour = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                entry.roc.fpr.iter().copied().zip(entry.roc.tpr.iter().copied()),
                colour.stroke_width(3),
            ))
            .map_err(|e| plot_err(&e))?
            .label(format!("{} ({:.4})", entry.label, entry.auc))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::LowerRight)
        .draw()
        .map_err(|e| plot_err(&e))?;
    root.present().map_err(|e| plot_err(&e))?;
    info!("Save plot {}", path.display());
    Ok(())
}
