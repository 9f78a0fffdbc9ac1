//! Seams to the learned components: a text embedder and a shape predictor.
//!
//! Neither is implemented here. Callers inject them, and [`predict_child`]
//! wires them to the frame decoder.

use crate::codec::SegmentTable;
use crate::error::ShapeError;
use crate::eval::Prediction;
use crate::frame::{decode_prediction, DecodeParams};

/// Turns a text description into a fixed embedding.
pub trait TextEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ShapeError>;
}

/// Everything a predictor sees for one child shape.
#[derive(Debug, Clone)]
pub struct PredictorInput {
    pub child_embedding: Vec<f32>,
    pub parent_embedding: Vec<f32>,
    /// Parent outline, in normalized canvas coordinates.
    pub parent: SegmentTable,
}

/// Predicts a child outline relative to its parent.
///
/// Coordinates of the returned prediction are normalized to `[0, 1]` in the
/// parent's bounding box.
pub trait ShapePredictor {
    fn predict(&self, input: &PredictorInput) -> Result<Prediction, ShapeError>;
}

/// Predict the outline of a child described by `child_text` inside `parent`.
pub fn predict_child(
    embedder: &dyn TextEmbedder,
    predictor: &dyn ShapePredictor,
    parent: &SegmentTable,
    child_text: &str,
    parent_text: &str,
    params: &DecodeParams,
) -> Result<SegmentTable, ShapeError> {
    let input = PredictorInput {
        child_embedding: embedder.embed(child_text)?,
        parent_embedding: embedder.embed(parent_text)?,
        parent: parent.clone(),
    };
    let prediction = predictor.predict(&input)?;
    log::debug!(
        "predicted {} steps for {:?} inside {:?}",
        prediction.steps(),
        child_text,
        parent_text
    );
    decode_prediction(&prediction, parent, params)
}
