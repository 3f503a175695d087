use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};

use fuel_tracker_rs::report::{load_fuel_records, load_sensor_records};
use fuel_tracker_rs::{FuelReport, RawSensorRecord, ReportConfig};

const FUEL_SUFFIXES: [&str; 2] = ["_fuel.json", "_fuel.json.gz"];

#[derive(Parser, Debug)]
struct Args {
    /// Single fuel dump (*_fuel.json[.gz])
    #[arg(long, conflicts_with = "dir")]
    fuel: Option<PathBuf>,

    /// Directory to batch replay (processes *_fuel.json[.gz])
    #[arg(long)]
    dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum refuel volume (L)
    #[arg(long)]
    min_refuel: Option<f64>,

    /// Minimum drain volume (L)
    #[arg(long)]
    min_drain: Option<f64>,

    /// Enable the ignition heuristic (A/B against the default run)
    #[arg(long, default_value_t = false)]
    use_ignition: bool,
}

/// `abc_fuel.json.gz` -> `abc`
fn report_stem(name: &str) -> Option<&str> {
    FUEL_SUFFIXES.iter().find_map(|suffix| name.strip_suffix(suffix))
}

/// First existing `<stem>_sensors.json[.gz]` next to the fuel dump.
fn sensor_sibling(fuel: &Path) -> Option<PathBuf> {
    let name = fuel.file_name()?.to_str()?;
    let stem = report_stem(name)?;
    let dir = fuel.parent().unwrap_or_else(|| Path::new("."));
    ["_sensors.json", "_sensors.json.gz"]
        .iter()
        .map(|suffix| dir.join(format!("{}{}", stem, suffix)))
        .find(|p| p.is_file())
}

fn run_once(path: &Path, config: &ReportConfig) -> anyhow::Result<Value> {
    let fuel_rows = load_fuel_records(path).with_context(|| format!("loading {}", path.display()))?;
    let sensor_path = sensor_sibling(path);
    let sensor_rows: Vec<RawSensorRecord> = match &sensor_path {
        Some(p) => load_sensor_records(p).with_context(|| format!("loading {}", p.display()))?,
        None => Vec::new(),
    };

    let report = FuelReport::build(&fuel_rows, &sensor_rows, config);
    let total = &report.stats.total;

    eprintln!(
        "{}: {} pts, {} refuel ({:.1} L), {} drain ({:.1} L), {:.1} L over {:.1} km",
        path.display(),
        report.observations.len(),
        total.refuel_count,
        total.refuel_liters,
        total.drain_count,
        total.drain_liters,
        total.consumption_liters,
        total.distance_km
    );

    Ok(json!({
        "log": path.display().to_string(),
        "sensors": sensor_path.map(|p| p.display().to_string()),
        "min_refuel": config.detection.min_refuel_liters,
        "min_drain": config.detection.min_drain_liters,
        "use_ignition": config.detection.use_ignition_heuristic,
        "rows": fuel_rows.len(),
        "observations": report.observations.len(),
        "days": total.day_count,
        "refuel_count": total.refuel_count,
        "refuel_liters": total.refuel_liters,
        "drain_count": total.drain_count,
        "drain_liters": total.drain_liters,
        "consumption_liters": total.consumption_liters,
        "distance_km": total.distance_km,
        "engine_hours": total.engine_hours,
        "avg_per_100km": total.avg_consumption_per_100km,
        "segments": report.track.segments.len(),
        "gaps": report.track.gaps.len(),
        "sensor_samples": report.sensor_samples.len()
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReportConfig::from_file(path)?,
        None => ReportConfig::default(),
    };
    if let Some(v) = args.min_refuel {
        config.detection.min_refuel_liters = v;
    }
    if let Some(v) = args.min_drain {
        config.detection.min_drain_liters = v;
    }
    config.detection.use_ignition_heuristic |= args.use_ignition;

    let mut results = Vec::new();

    if let Some(dir) = args.dir.as_ref() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(report_stem)
                    .is_some()
            })
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &config) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {:#}", path.display(), e),
            }
        }
    } else if let Some(fuel) = args.fuel.as_ref() {
        results.push(run_once(fuel, &config)?);
    } else {
        anyhow::bail!("Provide --fuel or --dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
