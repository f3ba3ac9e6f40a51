mod predict;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::predict::{
    compute_round, CatalogStore, PassKind, SatPass, SearchParameters, TleLoader,
};
use crate::web::Config;

#[derive(Parser)]
#[command(name = "passwatch")]
#[command(about = "Satellite pass prediction for amateur ground stations")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration and TLE catalog
    Validate,
    /// Print upcoming passes for the configured selection
    Predict {
        /// Hours ahead to search
        #[arg(long)]
        hours: Option<u32>,
        /// Minimum peak elevation in degrees
        #[arg(long, allow_hyphen_values = true)]
        min_elevation: Option<f64>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading {}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Validate => validate(&config),
        Commands::Predict {
            hours,
            min_elevation,
            json,
        } => predict(&config, hours, min_elevation, json).await,
        Commands::Serve => match web::run_server(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn load_catalog(config: &Config) -> Option<TleLoader> {
    let mut loader = TleLoader::new(config.predict.tle_folder.clone());
    match loader.load_all() {
        Ok(()) => Some(loader),
        Err(e) => {
            eprintln!("Error loading TLEs: {}", e);
            None
        }
    }
}

fn validate(config: &Config) -> ExitCode {
    let Some(loader) = load_catalog(config) else {
        return ExitCode::FAILURE;
    };

    match config.station.position() {
        Ok(Some(p)) => println!(
            "Station: {:.4}, {:.4}, {} m ({})",
            p.latitude_deg,
            p.longitude_deg,
            p.altitude_m,
            p.qth_locator()
        ),
        Ok(None) => println!("Station: not configured"),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let invalid = loader.invalid_entries();
    println!(
        "Catalog: {} satellites, {} with invalid elements",
        loader.len(),
        invalid.len()
    );
    for (info, e) in &invalid {
        println!("  {} ({}): {}", info.name, info.tle_source, e);
    }

    let entries = loader.entries();
    let mut ok = invalid.is_empty();
    println!("Selection: {} satellites", config.predict.selection.len());
    for id in &config.predict.selection {
        match entries.iter().find(|e| e.norad_id == *id) {
            Some(info) => println!("  {} {}", id, info.name),
            None => {
                println!("  {} not in catalog", id);
                ok = false;
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn predict(
    config: &Config,
    hours: Option<u32>,
    min_elevation: Option<f64>,
    json: bool,
) -> ExitCode {
    let station = match config.station.position() {
        Ok(Some(p)) => p,
        Ok(None) => {
            eprintln!("No station position configured");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let params = match SearchParameters::new(
        chrono::Utc::now(),
        hours.unwrap_or(config.predict.hours_ahead),
        min_elevation.unwrap_or(config.predict.min_elevation),
    ) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(loader) = load_catalog(config) else {
        return ExitCode::FAILURE;
    };
    if config.predict.selection.is_empty() {
        eprintln!("No satellites selected");
        return ExitCode::FAILURE;
    }

    let satellites = loader.selected_satellites(&config.predict.selection);
    let passes = compute_round(satellites, station, params).await;

    if json {
        match serde_json::to_string_pretty(&passes) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Serialization error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_table(&passes);
    }
    ExitCode::SUCCESS
}

fn print_table(passes: &[SatPass]) {
    if passes.is_empty() {
        println!("No passes");
        return;
    }
    println!(
        "{:<24} {:>6}  {:<20} {:<20} {:>6} {:>6} {:>6}",
        "Satellite", "NORAD", "AOS (UTC)", "LOS (UTC)", "MaxEl", "AosAz", "LosAz"
    );
    for pass in passes {
        match &pass.kind {
            PassKind::NearEarth {
                aos,
                los,
                aos_azimuth_deg,
                los_azimuth_deg,
                max_elevation_deg,
                ..
            } => println!(
                "{:<24} {:>6}  {:<20} {:<20} {:>6.1} {:>6.1} {:>6.1}",
                pass.satellite,
                pass.norad_id,
                aos.format("%Y-%m-%d %H:%M:%S"),
                los.format("%Y-%m-%d %H:%M:%S"),
                max_elevation_deg,
                aos_azimuth_deg,
                los_azimuth_deg
            ),
            PassKind::DeepSpace {
                azimuth_deg,
                elevation_deg,
                range_km,
                ..
            } => println!(
                "{:<24} {:>6}  deep space, az {:.1} el {:.1}, {:.0} km",
                pass.satellite, pass.norad_id, azimuth_deg, elevation_deg, range_km
            ),
        }
    }
}
