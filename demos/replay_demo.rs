//! Demonstration of the Synheart Pose Agent frame pipeline.
//!
//! This demo shows how to:
//! 1. Build joint and heatmap pipelines
//! 2. Feed synthetic heatmap tensors through them
//! 3. Receive per-frame latency metrics through an observer
//! 4. Print smoothed keypoints and a performance summary
//!
//! Run with: cargo run --example replay_demo

use std::thread;
use std::time::Duration;

use synheart_pose_agent::{
    core::{default_labels, describe_points, ConfidenceTensor, MeasurementReport, ReportBuilder},
    pipeline::{HeatmapPipeline, JointPipeline},
};

const WIDTH: usize = 16;
const HEIGHT: usize = 16;
const FRAMES: usize = 20;

fn main() {
    println!("Synheart Pose Agent - Replay Demo");
    println!("=================================");
    println!();

    let labels = default_labels();
    let mut joints = JointPipeline::new(3);
    joints.set_observer(|report: &MeasurementReport| {
        println!("  {report}");
    });
    let mut heatmap = HeatmapPipeline::new();
    let builder = ReportBuilder::new(labels.clone());

    let mut last = None;
    for frame in 0..FRAMES {
        joints.begin_frame();

        // Stand-in for model inference
        thread::sleep(Duration::from_millis(8));
        let tensor = synthetic_tensor(labels.len(), frame);

        let output = joints.process(&tensor);
        let field = heatmap.run(&tensor).field;
        println!(
            "[frame {frame:>2}] field peak {:.2}, {} keypoints",
            field.peak(),
            output.points.iter().flatten().count()
        );

        last = Some(output);
        thread::sleep(Duration::from_millis(25));
    }

    if let Some(output) = last {
        println!();
        println!("Smoothed keypoints:");
        for row in describe_points(&labels, &output.points, 3) {
            println!("{:>3}  {:<12} {}", row.channel, row.label, row.description);
        }

        let report = builder.frame(FRAMES as u64 - 1, &output.points, output.measurement);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("\n{json}"),
            Err(e) => eprintln!("Error serializing report: {e}"),
        }
    }

    if let Some(summary) = joints.summary() {
        println!();
        println!("Performance (last {} frames):", summary.cycles);
        println!("  Inference: {:.1} ms", summary.mean_inference_ms);
        println!("  Execution: {:.1} ms", summary.mean_execution_ms);
        if let Some(fps) = summary.mean_fps {
            println!("  FPS: {fps:.1}");
        }
    }
}

/// One blob per joint drifting across the grid; every third joint drops out
/// on odd frames.
fn synthetic_tensor(channels: usize, frame: usize) -> ConfidenceTensor {
    let mut data = vec![0.0; channels * WIDTH * HEIGHT];
    for k in 0..channels {
        if k % 3 == 2 && frame % 2 == 1 {
            continue;
        }
        let ci = (k * 3 + frame) % WIDTH;
        let cj = (k * 5 + frame / 2) % HEIGHT;
        for i in 0..WIDTH {
            for j in 0..HEIGHT {
                let d2 = (i as f64 - ci as f64).powi(2) + (j as f64 - cj as f64).powi(2);
                data[k * WIDTH * HEIGHT + i * HEIGHT + j] = 0.8 * (-d2 / 4.0).exp();
            }
        }
    }

    ConfidenceTensor::new(vec![channels, WIDTH, HEIGHT], data).expect("shape matches data")
}
