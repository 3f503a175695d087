use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;

use fuel_tracker_rs::aggregator::FuelStats;
use fuel_tracker_rs::format;
use fuel_tracker_rs::report::{load_fuel_records, load_sensor_records};
use fuel_tracker_rs::sensor_stats::{ChannelStats, SensorStats};
use fuel_tracker_rs::track::TrackLayout;
use fuel_tracker_rs::{
    Event, FuelReport, Observation, RawSensorRecord, ReportConfig, ReportSink,
    SensorSample,
};

#[derive(Parser, Debug)]
#[command(name = "fuel_tracker")]
#[command(about = "Fuel level report - refuel/drain detection and consumption rollups", long_about = None)]
struct Args {
    /// Fuel report response or row dump (.json or .json.gz)
    #[arg(value_name = "FUEL_JSON")]
    fuel: PathBuf,

    /// Sensor report response (.json or .json.gz)
    #[arg(long)]
    sensors: Option<PathBuf>,

    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum refuel volume (L)
    #[arg(long)]
    min_refuel: Option<f64>,

    /// Minimum drain volume (L)
    #[arg(long)]
    min_drain: Option<f64>,

    /// Maximum plausible consumption (L/h)
    #[arg(long)]
    max_consumption: Option<f64>,

    /// Drop fuel readings at or below 0.1 L
    #[arg(long)]
    filter_zeros: bool,

    /// Suppress drains recorded while moving
    #[arg(long)]
    ignition: bool,

    /// Write the derived report as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Look up the observation nearest to LAT LON
    #[arg(long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
    probe: Option<Vec<f64>>,
}

impl Args {
    fn resolve_config(&self) -> Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ReportConfig::default(),
        };
        if let Some(v) = self.min_refuel {
            config.detection.min_refuel_liters = v;
        }
        if let Some(v) = self.min_drain {
            config.detection.min_drain_liters = v;
        }
        if let Some(v) = self.max_consumption {
            config.detection.max_consumption_liters_per_hour = v;
        }
        if self.filter_zeros {
            config.filter_near_zero_fuel = true;
        }
        if self.ignition {
            config.detection.use_ignition_heuristic = true;
        }
        Ok(config)
    }
}

/// Prints the report to stdout.
struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn render_chart(&mut self, observations: &[Observation], sensors: &[SensorSample]) {
        let (lo, hi) = observations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
                (lo.min(o.liters), hi.max(o.liters))
            });
        println!("\n=== Fuel Level ===");
        println!("Points: {}  Sensor samples: {}", observations.len(), sensors.len());
        if let (Some(first), Some(last)) = (observations.first(), observations.last()) {
            println!(
                "Period: {} .. {}",
                format::timestamp(&first.timestamp),
                format::timestamp(&last.timestamp)
            );
            println!("Level range: {:.2} .. {:.2} L", lo, hi);
        }
    }

    fn render_map(&mut self, track: &TrackLayout, events: &[Event]) {
        println!("\n=== Track ===");
        println!("Segments: {}  Gaps: {}", track.segments.len(), track.gaps.len());
        if let Some(b) = track.bounds {
            println!(
                "Bounds: ({:.5}, {:.5}) .. ({:.5}, {:.5})",
                b.min_lat, b.min_lon, b.max_lat, b.max_lon
            );
        }
        println!("Event markers: {}", events.len());
    }

    fn render_tables(&mut self, stats: &FuelStats, sensor_stats: &SensorStats, events: &[Event]) {
        let t = &stats.total;
        println!("\n=== Summary ===");
        println!("Start level:   {:.2} L", t.start_liters);
        println!("End level:     {:.2} L", t.end_liters);
        println!("Refueled:      {:.2} L ({})", t.refuel_liters, t.refuel_count);
        println!("Drained:       {:.2} L ({})", t.drain_liters, t.drain_count);
        println!("Consumption:   {:.2} L", t.consumption_liters);
        println!("Distance:      {:.2} km", t.distance_km);
        println!("Engine hours:  {}", format::duration_hours(t.engine_hours));
        println!("Avg:           {:.2} L/100km", t.avg_consumption_per_100km);

        println!("\n=== Daily ===");
        for d in &stats.daily {
            println!(
                "{}  start {:>7.2}  end {:>7.2}  +{:>6.2}  -{:>6.2}  cons {:>7.2}  {:>8.2} km  {:>8}  {:>6.2} L/100km",
                d.date.format("%d.%m.%Y"),
                d.start_liters,
                d.end_liters,
                d.refuel_liters,
                d.drain_liters,
                d.consumption_liters,
                d.distance_km,
                format::duration_hours(d.engine_hours),
                d.avg_consumption_per_100km
            );
        }

        println!("\n=== Events ===");
        if events.is_empty() {
            println!("No events found");
        }
        for e in events {
            let (lat, lon) = e.location();
            println!(
                "{}  {:<6}  {:>7.2} L  {:.5}, {:.5}  {}",
                format::timestamp(&e.timestamp),
                e.kind.label(),
                e.volume_liters,
                lat,
                lon,
                format::map_link(lat, lon)
            );
        }

        print_channel("Temperature", "°C", sensor_stats.total.temperature.as_ref());
        print_channel("Humidity", "%", sensor_stats.total.humidity.as_ref());
    }

    fn highlight_point(&mut self, index: usize, observation: &Observation) {
        println!(
            "\nNearest point #{}: {} | {:.2} L | {:.1} km/h",
            index,
            format::timestamp(&observation.timestamp),
            observation.liters,
            observation.speed_kmh
        );
    }
}

fn print_channel(name: &str, unit: &str, stats: Option<&ChannelStats>) {
    if let Some(s) = stats {
        println!(
            "{}: min {:.1}{} max {:.1}{} avg {:.1}{} out of bounds {}",
            name,
            s.min,
            unit,
            s.max,
            unit,
            s.mean,
            unit,
            format::duration_hours(s.out_of_bounds_hours)
        );
    }
}

async fn load_sensors(path: Option<PathBuf>) -> Result<Vec<RawSensorRecord>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows = tokio::task::spawn_blocking(move || load_sensor_records(&path)).await??;
    Ok(rows)
}

fn write_json(path: &Path, report: &FuelReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.resolve_config()?;

    println!("[{}] Fuel Tracker RS Starting", ts_now());
    println!("  Fuel: {}", args.fuel.display());
    println!("  Min refuel: {} L", config.detection.min_refuel_liters);
    println!("  Min drain: {} L", config.detection.min_drain_liters);
    println!("  Max consumption: {} L/h", config.detection.max_consumption_liters_per_hour);
    println!("  Filter zeros: {}", config.filter_near_zero_fuel);
    println!("  Ignition heuristic: {}", config.detection.use_ignition_heuristic);

    // The two sources are independent; fetch them side by side.
    let fuel_path = args.fuel.clone();
    let fuel_task = tokio::task::spawn_blocking(move || load_fuel_records(&fuel_path));
    let (fuel_rows, sensor_rows) = tokio::join!(fuel_task, load_sensors(args.sensors.clone()));
    let fuel_rows = fuel_rows?.with_context(|| format!("loading {}", args.fuel.display()))?;
    let sensor_rows = sensor_rows?;

    let report = FuelReport::build(&fuel_rows, &sensor_rows, &config);
    if report.is_empty() {
        println!("[{}] No data for the selected period", ts_now());
        return Ok(());
    }

    let mut sink = ConsoleSink;
    report.publish(&mut sink);

    if let Some(probe) = &args.probe {
        if report.highlight_nearest(&mut sink, probe[0], probe[1]).is_none() {
            println!("\nNo point within 500 m of {:.5}, {:.5}", probe[0], probe[1]);
        }
    }

    if let Some(path) = &args.output {
        write_json(path, &report)?;
        println!("\n[{}] Report written to {}", ts_now(), path.display());
    }

    Ok(())
}

fn ts_now() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
