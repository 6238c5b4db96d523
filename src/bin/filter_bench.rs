use std::time::Instant;

use attitude_tracker_rs::config::{EstimatorConfig, FilterKind};
use attitude_tracker_rs::estimator::AttitudeEstimator;
use attitude_tracker_rs::types::{AccelData, GyroData, SensorSample};
use chrono::Utc;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "filter_bench")]
#[command(about = "Update throughput of the attitude filters", long_about = None)]
struct Args {
    /// Updates per filter
    #[arg(long, default_value_t = 1000)]
    iterations: u32,

    /// Only bench this filter
    #[arg(long, value_enum)]
    filter: Option<FilterKind>,
}

fn bench(kind: FilterKind, sample: &SensorSample, iterations: u32) -> f64 {
    let config = EstimatorConfig {
        filter: kind,
        ..EstimatorConfig::default()
    };
    let mut estimator = AttitudeEstimator::from_config(&config);

    let start = Instant::now();
    let mut last = estimator.update(sample);
    for _ in 1..iterations {
        last = estimator.update(sample);
    }
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "  {:<9} final roll {:7.2}° pitch {:7.2}° yaw {:7.2}°",
        format!("{:?}", kind),
        last.euler.roll,
        last.euler.pitch,
        last.euler.yaw
    );
    elapsed
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.iterations > 0, "--iterations must be at least 1");

    let sample = SensorSample::new(AccelData::new(0.0, 0.1, 1.0), GyroData::new(1.0, 2.0, 3.0), 0.1)
        .with_heading(45.0, true);

    let kinds = match args.filter {
        Some(kind) => vec![kind],
        None => vec![FilterKind::Ekf, FilterKind::Madgwick],
    };

    println!("[{}] Filter bench, {} updates each", Utc::now().format("%H:%M:%S"), args.iterations);
    for kind in kinds {
        let elapsed = bench(kind, &sample, args.iterations);
        let per_update_us = elapsed * 1e6 / args.iterations as f64;
        let rate_hz = if elapsed > 0.0 {
            args.iterations as f64 / elapsed
        } else {
            f64::INFINITY
        };
        println!(
            "  {:<9} {:.3} ms total, {:.2} µs/update, {:.0} Hz",
            format!("{:?}", kind),
            elapsed * 1e3,
            per_update_us,
            rate_hz
        );
    }

    Ok(())
}
