//! Command-line adapter for the zone polygon registry.
//!
//! # Responsibility
//! - Translate arguments and input files into core service calls.
//! - Render every outcome as a JSON envelope on stdout.

mod error;
mod output;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use polyzone_core::db::{open_db_with, Connection};
use polyzone_core::{
    init_logging, ClassificationService, Coordinate, RegistryConfig, RegistryService,
    SqliteGeometryStore,
};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "polyzone")]
#[command(about = "Register zone polygons and classify coordinates against them")]
#[command(version)]
struct Cli {
    /// Database file, overriding POLYZONE_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new zone from a GeoJSON FeatureCollection
    Insert {
        #[command(flatten)]
        target: NameArgs,

        /// GeoJSON FeatureCollection file ("-" reads stdin)
        #[arg(long)]
        geojson: PathBuf,
    },

    /// Replace the geometry of an existing zone
    Replace {
        #[command(flatten)]
        target: ZoneRef,

        /// GeoJSON FeatureCollection file ("-" reads stdin)
        #[arg(long)]
        geojson: PathBuf,
    },

    /// Delete a zone
    Delete {
        #[command(flatten)]
        target: ZoneRef,
    },

    /// Rename a zone from one "<glosa> - <postal_code>" name to another
    Rename {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Move a zone to a new postal code, keeping its glosa
    UpdateCode {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Change the glosa of the zone with the given postal code
    UpdateGlosa {
        #[arg(long)]
        postal_code: String,

        #[arg(long)]
        glosa: String,
    },

    /// Show one zone with its geometry
    Get {
        #[arg(long)]
        postal_code: String,
    },

    /// List every zone ordered by postal code
    List,

    /// Classify coordinates against the registered zones
    Classify {
        /// JSON array of {"lat": .., "lon": ..} objects ("-" reads stdin)
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        input: Option<PathBuf>,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
}

/// How a new zone is named. Without flags the first feature's
/// `properties.name` is used.
#[derive(Args)]
struct NameArgs {
    #[arg(long, requires = "postal_code", conflicts_with = "name")]
    glosa: Option<String>,

    #[arg(long, requires = "glosa")]
    postal_code: Option<String>,

    /// Composite "<glosa> - <postal_code>" name
    #[arg(long)]
    name: Option<String>,
}

/// Existing zone addressed by postal code or composite name.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ZoneRef {
    #[arg(long)]
    postal_code: Option<String>,

    #[arg(long)]
    name: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let code = run(cli).unwrap_or_else(|err| err.exit());
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let mut config = RegistryConfig::from_env().map_err(CliError::Config)?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Some(dir) = &config.log_dir {
        init_logging(config.log_level, &dir.to_string_lossy()).map_err(CliError::LoggingInit)?;
    }

    let conn = open_db_with(&config.db_path, &config.store_settings())
        .map_err(CliError::Database)?;
    log::debug!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    dispatch(&conn, cli.command)
}

fn dispatch(conn: &Connection, command: Commands) -> Result<i32, CliError> {
    let registry = RegistryService::new(SqliteGeometryStore::new(conn));

    let code = match command {
        Commands::Insert { target, geojson } => {
            let payload = read_json(&geojson)?;
            let result = match (target.glosa, target.postal_code, target.name) {
                (Some(glosa), Some(postal_code), _) => {
                    registry.insert_polygon(&glosa, &postal_code, &payload)
                }
                (_, _, Some(name)) => registry.insert_named_polygon(&name, &payload),
                _ => registry.insert_from_feature_name(&payload),
            };
            output::emit(result)
        }
        Commands::Replace { target, geojson } => {
            let payload = read_json(&geojson)?;
            let result = match (target.postal_code, target.name) {
                (Some(postal_code), _) => registry.replace_polygon(&postal_code, &payload),
                (None, Some(name)) => registry.replace_named_polygon(&name, &payload),
                (None, None) => unreachable!("clap requires one zone reference"),
            };
            output::emit(result)
        }
        Commands::Delete { target } => {
            let result = match (target.postal_code, target.name) {
                (Some(postal_code), _) => registry.delete_polygon(&postal_code),
                (None, Some(name)) => registry.delete_named_polygon(&name),
                (None, None) => unreachable!("clap requires one zone reference"),
            };
            output::emit(result)
        }
        Commands::Rename { from, to } => output::emit(registry.rename_polygon(&from, &to)),
        Commands::UpdateCode { from, to } => {
            output::emit(registry.update_postal_code(&from, &to))
        }
        Commands::UpdateGlosa { postal_code, glosa } => {
            output::emit(registry.update_glosa(&postal_code, &glosa))
        }
        Commands::Get { postal_code } => output::emit(registry.get_polygon(&postal_code)),
        Commands::List => output::emit(registry.list_polygons()),
        Commands::Classify { input, lat, lon } => {
            let classifier = ClassificationService::new(SqliteGeometryStore::new(conn));
            match (input, lat, lon) {
                (None, Some(lat), Some(lon)) => {
                    output::emit(classifier.classify_point(Coordinate::new(lat, lon)))
                }
                (input, _, _) => {
                    let source = input.unwrap_or_else(|| PathBuf::from("-"));
                    let coordinates: Vec<Coordinate> =
                        serde_json::from_value(read_json(&source)?)
                            .map_err(CliError::ParseInput)?;
                    output::emit(classifier.classify(&coordinates))
                }
            }
        }
    };

    Ok(code)
}

/// Reads a JSON document from a file, or from stdin when the path is `-`.
fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|error| CliError::ReadInput { path: None, error })?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|error| CliError::ReadInput {
            path: Some(path.to_path_buf()),
            error,
        })?
    };
    serde_json::from_str(&text).map_err(CliError::ParseInput)
}
