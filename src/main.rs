use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use attitude_tracker_rs::config::EstimatorConfig;
use attitude_tracker_rs::estimator::{AttitudeEstimator, EstimatorDiagnostics};
use attitude_tracker_rs::quaternion::Quaternion;
use attitude_tracker_rs::sensors::{DeviceReading, SampleClock, MAX_DT};
use attitude_tracker_rs::types::EulerAngles;
use attitude_tracker_rs::FilterKind;
use chrono::Utc;
use clap::Parser;
use flate2::read::GzDecoder;
use log::{info, warn};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "attitude_tracker")]
#[command(about = "Replay an IMU log through the attitude estimator", long_about = None)]
struct Args {
    /// JSON-lines device log (.jsonl or .jsonl.gz), "-" for stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Estimator config JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter to run
    #[arg(long, value_enum)]
    filter: Option<FilterKind>,

    /// Madgwick gain (0.01-0.5)
    #[arg(long)]
    beta: Option<f64>,

    /// Heading sensor trust slider (0-100)
    #[arg(long)]
    heading_trust: Option<f64>,

    /// Fixed sample interval in seconds; otherwise derived from record timestamps
    #[arg(long)]
    dt: Option<f64>,

    /// Longest timestamp gap integrated as-is [s]
    #[arg(long, default_value_t = MAX_DT)]
    max_dt: f64,

    /// Output file for orientation records (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct OrientationRecord {
    index: u64,
    dt: f64,
    euler: EulerAngles,
    /// Yaw as a compass heading, [0, 360)
    heading_360: f64,
    quaternion: Quaternion,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<EstimatorDiagnostics>,
}

#[derive(Default)]
struct ReplayStats {
    lines: u64,
    processed: u64,
    skipped: u64,
    heading_fixes: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    eprintln!("[{}] Attitude tracker starting", ts_now());
    eprintln!("  Input:  {}", args.input.display());
    eprintln!("  Filter: {:?}", config.filter);
    if config.filter == FilterKind::Madgwick {
        eprintln!("  Beta:   {:.3}", config.madgwick.beta);
    } else {
        eprintln!("  Heading trust: {:.0}%", config.heading_trust_percent);
    }

    let reader = open_input(&args.input)?;
    let mut writer = open_output(args.output.as_deref())?;

    let mut estimator = AttitudeEstimator::from_config(&config);
    let mut clock = SampleClock::new(args.dt.unwrap_or(config.nominal_dt()), args.max_dt);
    let mut stats = ReplayStats::default();
    let mut last_euler = EulerAngles::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        stats.lines += 1;

        let reading = match DeviceReading::from_json(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!("line {}: {}", line_no + 1, e);
                stats.skipped += 1;
                continue;
            }
        };

        let dt = match args.dt {
            Some(fixed) => fixed,
            None => clock.next_dt(reading.timestamp),
        };

        let sample = match reading.to_sample(dt) {
            Ok(s) => s,
            Err(e) => {
                warn!("line {}: {}", line_no + 1, e);
                stats.skipped += 1;
                continue;
            }
        };
        if sample.usable_heading().is_some() {
            stats.heading_fixes += 1;
        }

        let orientation = estimator.update(&sample);
        last_euler = orientation.euler;

        let record = OrientationRecord {
            index: stats.processed,
            dt,
            euler: orientation.euler,
            heading_360: orientation.euler.heading_360(),
            quaternion: orientation.quaternion,
            diagnostics: estimator.diagnostics(),
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        stats.processed += 1;
    }
    writer.flush()?;

    info!("replay finished after {} lines", stats.lines);
    eprintln!("[{}] Replay complete", ts_now());
    eprintln!(
        "  Samples: {} processed, {} skipped, {} with heading",
        stats.processed, stats.skipped, stats.heading_fixes
    );
    eprintln!(
        "  Final attitude: roll {:.2}°  pitch {:.2}°  yaw {:.2}°",
        last_euler.roll, last_euler.pitch, last_euler.yaw
    );
    if let Some(diag) = estimator.diagnostics() {
        eprintln!(
            "  Uncertainty: ±{:.2}° ±{:.2}° ±{:.2}°",
            diag.uncertainty.0, diag.uncertainty.1, diag.uncertainty.2
        );
        eprintln!(
            "  Gyro bias:   {:.3} {:.3} {:.3} °/s",
            diag.gyro_bias.0, diag.gyro_bias.1, diag.gyro_bias.2
        );
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<EstimatorConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => EstimatorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EstimatorConfig::default(),
    };

    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    if let Some(beta) = args.beta {
        config.madgwick.beta = beta;
    }
    if let Some(trust) = args.heading_trust {
        config.heading_trust_percent = trust;
    }
    if let Some(dt) = args.dt {
        anyhow::ensure!(dt.is_finite() && dt > 0.0, "--dt must be positive, got {}", dt);
        config.madgwick.sample_freq_hz = 1.0 / dt;
    }

    Ok(config.sanitized())
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
