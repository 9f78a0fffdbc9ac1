//! Loss terms for predicted segment sequences against ground-truth tables.
//!
//! A batch pairs per-sample predictions (`S` steps each) with ground-truth
//! tables (`T_gt` rows each). Positions past a sample's length never
//! contribute to the coordinate or type terms, so padded values are free.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::codec::SegmentTable;
use crate::error::ShapeError;
use crate::segment::{SegmentKind, SEGMENT_WIDTH};

/// Floor for the logarithms of the stop term.
const LOG_FLOOR: f64 = -100.0;

/// Model output for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `S x 6` normalized coordinates.
    pub segments: DMatrix<f64>,
    /// `S x 3` unnormalized class scores (line, quadratic, cubic).
    pub type_logits: DMatrix<f64>,
    /// `S` stop probabilities in `[0, 1]`.
    pub stop_probs: DVector<f64>,
}

impl Prediction {
    /// Number of predicted steps `S`.
    pub fn steps(&self) -> usize {
        self.segments.nrows()
    }

    /// Check that all three outputs agree on `S` and on their widths.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        let s = self.steps();
        if self.segments.ncols() != SEGMENT_WIDTH {
            return Err(ShapeError::BatchShape(format!(
                "segments have {} columns, expected {}",
                self.segments.ncols(),
                SEGMENT_WIDTH
            )));
        }
        if self.type_logits.shape() != (s, SegmentKind::ALL.len()) {
            return Err(ShapeError::BatchShape(format!(
                "type logits are {:?}, expected ({}, 3)",
                self.type_logits.shape(),
                s
            )));
        }
        if self.stop_probs.len() != s {
            return Err(ShapeError::BatchShape(format!(
                "{} stop probabilities for {} steps",
                self.stop_probs.len(),
                s
            )));
        }
        Ok(())
    }
}

/// Weights of the loss terms. Every term is also multiplied by `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub curve: f64,
    pub stop: f64,
    pub length: f64,
    pub kind: f64,
    pub scale: f64,
    /// Weight of positive targets in the stop term.
    pub stop_positive_weight: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            curve: 2000.0,
            stop: 10.0,
            length: 20.0,
            kind: 100.0,
            scale: 10.0,
            stop_positive_weight: 5.0,
        }
    }
}

/// Weighted loss terms of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LossBreakdown {
    pub curve: f64,
    pub stop: f64,
    pub length: f64,
    pub kind: f64,
    pub total: f64,
    /// Expected sequence length per sample.
    pub expected_lengths: Vec<f64>,
}

impl LossBreakdown {
    fn zero() -> Self {
        Self {
            curve: 0.0,
            stop: 0.0,
            length: 0.0,
            kind: 0.0,
            total: 0.0,
            expected_lengths: Vec::new(),
        }
    }
}

/// `B x S` matrix holding 1.0 where `s < lengths[b]`, else 0.0.
pub fn validity_mask(lengths: &[usize], steps: usize) -> DMatrix<f64> {
    DMatrix::from_fn(lengths.len(), steps, |b, s| if s < lengths[b] { 1.0 } else { 0.0 })
}

/// Expected length under per-step stop probabilities.
///
/// `E = sum_k prod_{i<k} (1 - p_i)`: step 0 is always reached.
pub fn expected_length(stop_probs: &DVector<f64>) -> f64 {
    let mut survival = 1.0;
    let mut expected = 0.0;
    for p in stop_probs.iter() {
        expected += survival;
        survival *= 1.0 - p;
    }
    expected
}

/// Evaluate a batch of predictions against ground-truth tables.
pub fn evaluate(
    predictions: &[Prediction],
    ground_truth: &[SegmentTable],
    weights: &LossWeights,
) -> Result<LossBreakdown, ShapeError> {
    if predictions.len() != ground_truth.len() {
        return Err(ShapeError::BatchShape(format!(
            "{} predictions for {} ground-truth tables",
            predictions.len(),
            ground_truth.len()
        )));
    }
    let batch = predictions.len();
    if batch == 0 {
        return Ok(LossBreakdown::zero());
    }

    let steps = predictions[0].steps();
    let gt_rows = ground_truth[0].capacity();
    for (b, prediction) in predictions.iter().enumerate() {
        prediction.check_shape()?;
        if prediction.steps() != steps {
            return Err(ShapeError::BatchShape(format!(
                "sample {} has {} steps, sample 0 has {}",
                b,
                prediction.steps(),
                steps
            )));
        }
    }
    if let Some((b, table)) = ground_truth.iter().enumerate().find(|(_, t)| t.capacity() != gt_rows) {
        return Err(ShapeError::BatchShape(format!(
            "ground truth {} has {} rows, ground truth 0 has {}",
            b,
            table.capacity(),
            gt_rows
        )));
    }

    let lengths: Vec<usize> = ground_truth.iter().map(SegmentTable::len).collect();
    let mask = validity_mask(&lengths, steps);
    let scale = weights.scale;

    let curve = weights.curve * scale * curve_error(predictions, ground_truth, &mask, steps.min(gt_rows));
    let stop = weights.stop * scale * stop_bce(predictions, &lengths, weights.stop_positive_weight);

    let expected_lengths: Vec<f64> = predictions.iter().map(|p| expected_length(&p.stop_probs)).collect();
    let length_error = expected_lengths
        .iter()
        .zip(&lengths)
        .map(|(e, &len)| (e - len as f64).abs())
        .sum::<f64>()
        / batch as f64;
    let length = weights.length * scale * length_error;

    let kind = weights.kind * scale * type_cross_entropy(predictions, ground_truth, steps, gt_rows);

    let breakdown = LossBreakdown {
        curve,
        stop,
        length,
        kind,
        total: curve + stop + length + kind,
        expected_lengths,
    };
    log::debug!("{}", breakdown);
    Ok(breakdown)
}

/// Mean absolute coordinate error over valid rows `s < compare`.
fn curve_error(
    predictions: &[Prediction],
    ground_truth: &[SegmentTable],
    mask: &DMatrix<f64>,
    compare: usize,
) -> f64 {
    let mut error = 0.0;
    let mut valid = 0.0;
    for (b, (prediction, table)) in predictions.iter().zip(ground_truth).enumerate() {
        for s in 0..compare {
            let weight = mask[(b, s)];
            if weight == 0.0 {
                continue;
            }
            let row = &table.rows()[s];
            let diff: f64 = (0..SEGMENT_WIDTH)
                .map(|c| (prediction.segments[(s, c)] - row[c] as f64).abs())
                .sum();
            error += diff * weight;
            valid += weight;
        }
    }
    error / (valid * SEGMENT_WIDTH as f64).max(1e-9)
}

/// Weighted binary cross-entropy of the stop probabilities, mean over `B x S`.
///
/// The target is 1 from the last real step onward.
fn stop_bce(predictions: &[Prediction], lengths: &[usize], positive_weight: f64) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (prediction, &len) in predictions.iter().zip(lengths) {
        let last = len.saturating_sub(1);
        for (s, &p) in prediction.stop_probs.iter().enumerate() {
            let term = if s >= last {
                -positive_weight * p.ln().max(LOG_FLOOR)
            } else {
                -(1.0 - p).ln().max(LOG_FLOOR)
            };
            sum += term;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Mean softmax cross-entropy of the type logits over valid rows.
///
/// Labels are capped at `gt_rows` as well as `steps`. A table's length never
/// exceeds its row count, so both sides always hold the same rows; the count
/// check only trips for tables whose length and rows disagree.
fn type_cross_entropy(
    predictions: &[Prediction],
    ground_truth: &[SegmentTable],
    steps: usize,
    gt_rows: usize,
) -> f64 {
    let mut logits: Vec<(usize, usize)> = Vec::new();
    let mut labels: Vec<SegmentKind> = Vec::new();
    for (b, table) in ground_truth.iter().enumerate() {
        let len = table.len();
        logits.extend((0..len.min(steps)).map(|s| (b, s)));
        labels.extend(table.rows()[..len.min(steps).min(gt_rows)].iter().map(SegmentKind::of_row));
    }

    if logits.is_empty() {
        return 0.0;
    }
    if logits.len() != labels.len() {
        log::warn!(
            "type loss skipped: {} logit rows but {} labels",
            logits.len(),
            labels.len()
        );
        return 0.0;
    }

    let total: f64 = logits
        .iter()
        .zip(&labels)
        .map(|(&(b, s), kind)| {
            let row = predictions[b].type_logits.row(s);
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = max + row.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
            log_sum - row[kind.index()]
        })
        .sum();
    total / logits.len() as f64
}

impl fmt::Display for LossBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean_expected = if self.expected_lengths.is_empty() {
            0.0
        } else {
            self.expected_lengths.iter().sum::<f64>() / self.expected_lengths.len() as f64
        };
        write!(
            f,
            "total={:.3} | curve={:.3} stop={:.3} length={:.3} kind={:.3} | E[len]={:.2}",
            self.total, self.curve, self.stop, self.length, self.kind, mean_expected
        )
    }
}
