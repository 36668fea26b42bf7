//! Integration tests for the decode / smooth / measure pipeline

use std::sync::{Arc, Mutex};
use synheart_pose_agent::core::{
    describe_points, ConfidenceTensor, HeatmapAggregator, HeatmapDecoder, KeypointSmoother,
    ManualClock, MeasurementReport, PerformanceMeasurement, PredictedPoint,
};
use synheart_pose_agent::pipeline::JointPipeline;
use synheart_pose_agent::stats::create_shared_log;
use synheart_pose_agent::TensorFrame;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// `[K][W][H]` tensor with one peak per channel.
fn tensor_with_peaks(width: usize, height: usize, peaks: &[(usize, usize, f64)]) -> ConfidenceTensor {
    let channels = peaks
        .iter()
        .map(|&(i, j, c)| {
            let mut plane = vec![vec![0.01; height]; width];
            plane[i][j] = c;
            plane
        })
        .collect();
    ConfidenceTensor::from_nested(channels).unwrap()
}

#[test]
fn test_reference_scenario_decodes_to_cell_center() {
    let frame: TensorFrame =
        serde_json::from_str(r#"{"shape":[1,2,2],"data":[0.0,0.9,0.2,0.0]}"#).unwrap();
    let tensor = frame.into_tensor().unwrap();

    let points = HeatmapDecoder::new().decode(&tensor).unwrap();
    assert_eq!(points.len(), 1);

    let point = points[0].unwrap();
    assert!(close(point.x, 0.25));
    assert!(close(point.y, 0.75));
    assert!(close(point.confidence, 0.9));
}

#[test]
fn test_unique_peaks_decoded_for_every_channel() {
    let peaks = [(0, 0, 0.5), (3, 1, 0.8), (5, 4, 0.3), (2, 6, 0.95)];
    let tensor = tensor_with_peaks(6, 7, &peaks);

    let points = HeatmapDecoder::new().decode(&tensor).unwrap();
    assert_eq!(points.len(), peaks.len());

    for (point, &(i, j, c)) in points.iter().zip(peaks.iter()) {
        let point = point.unwrap();
        assert!(close(point.x, (i as f64 + 0.5) / 6.0));
        assert!(close(point.y, (j as f64 + 0.5) / 7.0));
        assert!(close(point.confidence, c));
    }
}

#[test]
fn test_aggregate_stays_in_unit_range() {
    // 14 channels of 0.2 everywhere sum to 2.8 per cell
    let data = vec![0.2; 14 * 4 * 5];
    let tensor = ConfidenceTensor::new(vec![14, 4, 5], data).unwrap();

    let field = HeatmapAggregator::new().aggregate(&tensor).unwrap();
    assert_eq!(field.cells().len(), 20);
    assert!(field.cells().iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(field.peak(), 1.0);
}

#[test]
fn test_smoother_mixed_window() {
    let mut smoother = KeypointSmoother::new(3);
    smoother.smooth(&[Some(PredictedPoint::new(0.0, 0.0, 0.5))]);
    smoother.smooth(&[None]);
    let out = smoother.smooth(&[Some(PredictedPoint::new(2.0, 0.0, 0.7))]);

    let point = out[0].unwrap();
    assert!(close(point.x, 1.0));
    assert!(close(point.y, 0.0));
    assert!(close(point.confidence, 1.2));
}

#[test]
fn test_meter_cycles_with_observer() {
    let clock = ManualClock::new(0.0);
    let mut meter = PerformanceMeasurement::with_clock(clock.clone());
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    meter.set_observer(move |r: &MeasurementReport| sink.lock().unwrap().push(*r));

    for (t0, t1, t2) in [(10.0, 10.03, 10.05), (10.5, 10.52, 10.6)] {
        clock.set(t0);
        meter.start();
        clock.set(t1);
        meter.label("endInference");
        clock.set(t2);
        meter.stop();
    }

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(close(reports[0].inference_time, 0.03));
    assert!(close(reports[0].execution_time, 0.05));
    assert!(close(reports[1].inference_time, 0.02));
    assert!(close(reports[1].execution_time, 0.1));
    assert_eq!(reports[1].fps, Some(2));
}

#[test]
fn test_pipeline_stream_with_dropouts() {
    let clock = ManualClock::new(0.0);
    let log = create_shared_log();
    let mut pipeline = JointPipeline::with_parts(3, clock.clone(), log.clone());

    // Channel 1 drops out in the middle frame
    let frames = [
        tensor_with_peaks(4, 4, &[(1, 1, 0.6), (2, 2, 0.4)]),
        ConfidenceTensor::from_nested(vec![
            {
                let mut plane = vec![vec![0.0; 4]; 4];
                plane[1][1] = 0.6;
                plane
            },
            vec![vec![0.0; 4]; 4],
        ])
        .unwrap(),
        tensor_with_peaks(4, 4, &[(1, 1, 0.6), (2, 2, 0.4)]),
    ];

    let mut last = None;
    for (n, tensor) in frames.iter().enumerate() {
        clock.set(n as f64 / 30.0);
        pipeline.begin_frame();
        clock.advance(0.005);
        last = Some(pipeline.process(tensor));
    }

    let last = last.unwrap();
    let joint0 = last.points[0].unwrap();
    let joint1 = last.points[1].unwrap();
    assert!(close(joint0.confidence, 1.8));
    assert!(close(joint1.confidence, 0.8));
    assert!(close(joint1.x, 2.5 / 4.0));
    assert_eq!(last.measurement.unwrap().fps, Some(30));

    let stats = log.stats();
    assert_eq!(stats.frames_decoded, 3);
    assert_eq!(stats.absent_keypoints, 1);

    let labels = vec!["top".to_string(), "neck".to_string()];
    let rows = describe_points(&labels, &last.points, 3);
    assert_eq!(rows[1].description, "(0.625, 0.625), [0.800]");
}

#[test]
fn test_malformed_frames_are_errors_not_panics() {
    let huge = 1usize << 32;
    let frame = TensorFrame::new(vec![huge, huge, 2], Vec::new());
    assert!(frame.into_tensor().is_err());

    let direct = serde_json::from_str::<ConfidenceTensor>(r#"{"shape":[1,2,2],"data":[0.5]}"#);
    assert!(direct.is_err());

    let mut pipeline = JointPipeline::new(3);
    let tensor = ConfidenceTensor::new(vec![1, 1, 2], vec![f64::NAN, 0.4]).unwrap();
    let point = pipeline.run(&tensor).points[0].unwrap();
    assert!(close(point.confidence, 0.4));
}
