mod common;

use common::masks::{centred_square, disc, filled_rect};
use kurbo::{Point, Vec2};
use nalgebra::{DMatrix, DVector};
use shapeseq::eval::{evaluate, LossWeights, Prediction};
use shapeseq::frame::{decode_prediction, BoundingBox, DecodeParams};
use shapeseq::render::render_table;
use shapeseq::sample::{context_points, point_validity, SampleCounts};
use shapeseq::segment::is_padding_row;
use shapeseq::{fit_file, fit_mask, OverflowPolicy, PipelineConfig, SegmentKind, ShapeError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn inset_square_fits_four_lines() {
    init_logging();
    let mask = centred_square(100, 64);
    let result = fit_mask(&mask, &PipelineConfig::default()).unwrap();

    assert_eq!(result.table.len(), 4);
    assert_eq!(result.table.kinds(), vec![SegmentKind::Line; 4]);
    assert!(result.table.rows()[4..].iter().all(is_padding_row));

    let corners = [(18.0, 18.0), (81.0, 18.0), (81.0, 81.0), (18.0, 81.0)]
        .map(|(x, y)| Point::new(x / 99.0, y / 99.0));
    for segment in result.table.decode() {
        let end = segment.end();
        assert!(
            corners.iter().any(|c| c.distance(end) < 1e-6),
            "endpoint {:?} is not a corner",
            end
        );
    }
}

#[test]
fn fitted_disc_renders_as_closed_chain() {
    init_logging();
    let mask = disc(120, 40.0);
    let result = fit_mask(&mask, &PipelineConfig::default()).unwrap();
    assert!(result.table.len() >= 4);
    assert!(result.table.len() <= 30);

    let rendered = render_table(&result.table, None, 10);
    assert_eq!(rendered.kinds.len(), result.table.len());
    assert_eq!(rendered.points.len(), 10 + 9 * (result.table.len() - 1));
    assert_eq!(rendered.points.first(), rendered.points.last());

    // Everything stays near the circle of radius 40 around the centre.
    let centre = Point::new(59.5 / 119.0, 59.5 / 119.0);
    for p in &rendered.points {
        let r = p.distance(centre) * 119.0;
        assert!((r - 40.0).abs() < 4.0, "rendered point at radius {}", r);
    }
}

#[test]
fn overflow_policy_is_honoured() {
    let mask = centred_square(100, 64);
    let truncating = PipelineConfig {
        max_segments: 2,
        ..PipelineConfig::default()
    };
    let result = fit_mask(&mask, &truncating).unwrap();
    assert_eq!(result.segments.len(), 4);
    assert_eq!(result.table.len(), 2);
    assert_eq!(result.table.capacity(), 2);

    let rejecting = PipelineConfig {
        overflow: OverflowPolicy::Reject,
        ..truncating
    };
    assert!(matches!(
        fit_mask(&mask, &rejecting),
        Err(ShapeError::SequenceOverflow { count: 4, max: 2 })
    ));
}

#[test]
fn empty_mask_is_degenerate() {
    let mask = filled_rect(32, 32, 0, 0, 0, 0);
    assert!(matches!(
        fit_mask(&mask, &PipelineConfig::default()),
        Err(ShapeError::DegenerateMask)
    ));
}

#[test]
fn context_points_of_a_fitted_parent() {
    let mask = centred_square(100, 64);
    let result = fit_mask(&mask, &PipelineConfig::default()).unwrap();
    let polygon = result.normalized_polygon();
    let counts = SampleCounts { total: 200, boundary: 40 };
    let unit = Vec2::new(1.0, 1.0);

    let points = context_points(Some(&polygon), Some(&mask), counts, unit);
    assert_eq!(points.len(), 200);
    assert_eq!(&points[..4], &polygon[..]);
    let interior = &points[40..];
    assert!(point_validity(interior, &mask, unit).iter().all(|&v| v));
}

#[test]
fn config_file_drives_fitting() {
    let dir = tempfile::tempdir().unwrap();
    let mask_path = dir.path().join("mask.png");
    centred_square(100, 64).save(&mask_path).unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, r#"{"max_segments": 8, "threshold": "otsu"}"#).unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    let result = fit_file(&mask_path, &config).unwrap();
    assert_eq!(result.table.capacity(), 8);
    assert_eq!(result.table.len(), 4);
}

#[test]
fn ground_truth_scores_itself_perfectly() {
    let parent_mask = centred_square(100, 80);
    let child_mask = centred_square(100, 40);
    let config = PipelineConfig::default();
    let parent = fit_mask(&parent_mask, &config).unwrap().table;
    let child = fit_mask(&child_mask, &config).unwrap().table;
    let steps = child.capacity();

    // Express the child relative to the parent frame, as a predictor would.
    let frame = BoundingBox::of_table(&parent).unwrap();
    let range = frame.range();
    let relative = DMatrix::from_fn(steps, 6, |s, c| {
        let v = child.rows()[s][c] as f64;
        if s >= child.len() || v < 0.0 {
            return v;
        }
        if c % 2 == 0 {
            (v - frame.min.x) / range.x
        } else {
            (v - frame.min.y) / range.y
        }
    });
    let last = child.len() - 1;
    let prediction = Prediction {
        segments: relative,
        type_logits: DMatrix::from_fn(steps, 3, |_, k| if k == 0 { 20.0 } else { 0.0 }),
        stop_probs: DVector::from_fn(steps, |s, _| if s >= last { 0.99 } else { 0.01 }),
    };

    let decoded = decode_prediction(&prediction, &parent, &DecodeParams::default()).unwrap();
    assert_eq!(decoded.len(), child.len());
    for (a, b) in decoded.real_rows().iter().zip(child.real_rows()) {
        for c in 0..6 {
            assert!((a[c] - b[c]).abs() < 1e-5, "{:?} vs {:?}", a, b);
        }
    }

    let loss = evaluate(&[prediction], &[child.clone()], &LossWeights::default()).unwrap();
    assert!(loss.kind < 1e-3);
    assert!((loss.expected_lengths[0] - child.len() as f64).abs() < 0.1);
}
