//! SAD GRS Estimator
//!
//! Decision support for municipal solid-waste management: classifies
//! households by their IPTU assessment, estimates daily waste generation per
//! material and projects it over time, units and landfill volume.

mod aggregator;
mod artifacts;
mod cities;
mod classifier;
mod config;
mod db;
mod error;
mod listing;
mod models;
mod pipeline;
mod projection;
mod report;
mod store;
mod units;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::Settings;
use crate::models::{Bound, Scope};
use crate::pipeline::Visualization;
use crate::projection::ProjectionParameters;
use crate::store::ResultStore;
use crate::units::{TimeBase, Unit};

#[derive(Parser)]
#[command(name = "grs")]
#[command(about = "Household solid-waste generation estimator")]
struct Cli {
    /// Settings file (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the statistics catalog, overrides the settings file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Path to the prediction result file, overrides the settings file
    #[arg(long)]
    result: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize an empty statistics catalog
    Init,

    /// Import per-class statistics artifacts from a directory
    ImportStats {
        /// Directory holding media_classe_N, margem_classe_N and media_emb_N files
        source_dir: PathBuf,

        /// Clear existing statistics before importing
        #[arg(long)]
        clear: bool,
    },

    /// Load reference statistics and a sample model for testing
    LoadSample,

    /// Show the class statistics in the catalog
    Stats,

    /// List model files available for prediction
    ListModels,

    /// List selectable cities
    ListCities,

    /// Estimate waste generation for a household listing
    Predict {
        /// Listing with an IPTU column (.csv or .xlsx)
        #[arg(short, long, conflicts_with = "default_listing")]
        input: Option<PathBuf>,

        /// Use the configured default listing (Campo Grande)
        #[arg(long)]
        default_listing: bool,

        /// Model file name inside the models directory
        #[arg(short, long)]
        model: Option<String>,

        /// City the listing belongs to
        #[arg(long)]
        city: Option<String>,
    },

    /// Project the last prediction over time, unit and scope
    Visualize {
        /// Unit of measure: t, kg, g
        #[arg(short, long, default_value = "t")]
        unit: Unit,

        /// Time base: day, month, year
        #[arg(short, long, default_value = "day")]
        time: TimeBase,

        /// Materials: recyclables, non-recyclables, total
        #[arg(short, long, default_value = "total")]
        scope: Scope,

        /// Normalize per person with this many persons per household (1-10)
        #[arg(long, value_name = "PERSONS")]
        per_person: Option<u32>,

        /// Estimate landfill volume at this compacted density, ton/m³ (0.6-0.8)
        #[arg(long, value_name = "DENSITY")]
        volume: Option<f64>,

        /// Show the packaging / non-packaging proportion
        #[arg(long)]
        packaging: bool,

        /// Which estimate to project: estimate, lower, upper
        #[arg(long, default_value = "estimate")]
        bound: Bound,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_json(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(database) = cli.database {
        settings.database = database;
    }
    if let Some(result) = cli.result {
        settings.result_file = result;
    }
    settings.validate()?;
    debug!(?settings, "settings resolved");

    match cli.command {
        Commands::Init => {
            open_catalog(&settings)?;
            println!("Catalog initialized at: {}", settings.database.display());
        }

        Commands::ImportStats { source_dir, clear } => {
            let conn = open_catalog(&settings)?;
            if clear {
                println!("Clearing existing statistics...");
                db::clear_statistics(&conn)?;
            }

            let stats = artifacts::import_to_catalog(&conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::LoadSample => {
            let conn = open_catalog(&settings)?;
            load_sample_data(&conn, &settings)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Stats => {
            let conn = open_catalog(&settings)?;
            let stats = db::load_class_statistics(&conn)?;
            println!("{} classes in {}", stats.len(), settings.database.display());
            for (label, profile) in stats.iter() {
                println!("Class {}", label);
                println!("  {:<30} {:>12} {:>12}", "Material", "Mean (g)", "Margin (g)");
                for (material, mean) in profile.mean.iter() {
                    let marker = if material.is_recyclable() { "*" } else { " " };
                    println!(
                        "  {}{:<29} {:>12.2} {:>12.2}",
                        marker,
                        material.display_name(),
                        mean,
                        profile.margin.get(material)
                    );
                }
                println!(
                    "  Packaging {:.3} / non-packaging {:.3}",
                    profile.packaging.packaging, profile.packaging.non_packaging
                );
            }
            println!("* recyclable");
        }

        Commands::ListModels => {
            let models = classifier::list_models(&settings.models_dir)?;
            if models.is_empty() {
                println!("No models in {}. Run 'load-sample' first.", settings.models_dir.display());
            } else {
                println!("Available models:");
                for m in models {
                    println!("  {}", m);
                }
            }
        }

        Commands::ListCities => {
            for city in cities::load_cities(&settings.cities_file)? {
                println!("{}", city);
            }
        }

        Commands::Predict {
            input,
            default_listing,
            model,
            city,
        } => {
            let listing_path = match (input, default_listing) {
                (Some(path), _) => path,
                (None, true) => settings.default_listing.clone(),
                (None, false) => {
                    anyhow::bail!("Provide a listing with --input or use --default-listing")
                }
            };

            let city_list = cities::load_cities(&settings.cities_file)?;
            let city = cities::resolve_city(&city_list, city.as_deref())?;

            let model_name = model.unwrap_or_else(|| settings.default_model.clone());
            let classifier =
                classifier::load_model(&classifier::model_path(&settings.models_dir, &model_name))?;

            let conn = open_catalog(&settings)?;
            let stats = db::load_class_statistics(&conn)?;
            let listing = listing::read_listing(&listing_path)?;
            println!(
                "Classifying {} households from {}",
                listing.household_count(),
                listing.source.display()
            );

            let record = pipeline::predict(
                classifier.as_ref(),
                &city,
                &listing.iptu,
                &stats,
                settings.mean_of_means,
            )?;
            let store = ResultStore::new(&settings.result_file);
            store.save(&record)?;

            println!("{}", report::format_prediction(&record));
            println!("Result saved to {}", store.path().display());
            println!("Run 'visualize' for projections over time, units and landfill volume.");
        }

        Commands::Visualize {
            unit,
            time,
            scope,
            per_person,
            volume,
            packaging,
            bound,
        } => {
            let params = ProjectionParameters {
                unit,
                time_base: time,
                scope,
                bound,
                persons_per_household: per_person,
                landfill_density: volume,
                show_packaging: packaging,
            };

            let store = ResultStore::new(&settings.result_file);
            match pipeline::visualize(&store, &params)? {
                Visualization::NeedsPrediction => {
                    println!("{}", pipeline::RUN_PREDICTION_FIRST);
                }
                Visualization::Ready { record, projection } => {
                    println!("{} ({} households)", record.city, record.estimate.household_count);
                    println!("{}", projection);
                }
            }
        }
    }

    Ok(())
}

fn open_catalog(settings: &Settings) -> Result<Connection> {
    if let Some(parent) = settings.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let conn = Connection::open(&settings.database)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// Load reference class statistics and a matching classifier for trying the
/// tool without trained artifacts
fn load_sample_data(conn: &Connection, settings: &Settings) -> Result<()> {
    use crate::classifier::{GaussianClass, GaussianNaiveBayes};
    use crate::db::VectorTable;
    use crate::models::{MaterialVector, PackagingRatio};

    db::clear_statistics(conn)?;

    // Grams per household per day:
    // plastic, paper, glass, metal, multilayer, textile, organic, rejects
    let samples = [
        (
            1,
            [95.0, 70.0, 20.0, 10.0, 8.0, 12.0, 420.0, 160.0],
            [14.0, 11.0, 5.0, 3.0, 2.0, 4.0, 63.0, 28.0],
            (0.38, 0.62),
        ),
        (
            2,
            [120.0, 95.0, 28.0, 14.0, 11.0, 18.0, 510.0, 190.0],
            [19.0, 15.0, 7.0, 4.0, 3.0, 6.0, 82.0, 34.0],
            (0.42, 0.58),
        ),
        (
            3,
            // No textile was found in the class 3 samples
            [160.0, 140.0, 45.0, 20.0, 15.0, 0.0, 580.0, 210.0],
            [27.0, 24.0, 11.0, 6.0, 4.0, 0.0, 99.0, 40.0],
            (0.47, 0.53),
        ),
    ];

    for (class_id, mean, margin, (packaging, non_packaging)) in samples {
        db::upsert_class_vector(conn, VectorTable::Means, class_id, &MaterialVector::new(mean))?;
        db::upsert_class_vector(conn, VectorTable::Margins, class_id, &MaterialVector::new(margin))?;
        db::upsert_packaging(
            conn,
            class_id,
            &PackagingRatio {
                packaging,
                non_packaging,
            },
        )?;
    }
    println!("Loaded statistics for {} classes", samples.len());

    // IPTU in reais: mean and variance per class
    let model = GaussianNaiveBayes::new(
        &settings.default_model,
        vec![
            GaussianClass {
                label: 1,
                prior: 0.5,
                mean: 350.0,
                variance: 22_500.0,
            },
            GaussianClass {
                label: 2,
                prior: 0.35,
                mean: 900.0,
                variance: 62_500.0,
            },
            GaussianClass {
                label: 3,
                prior: 0.15,
                mean: 2_200.0,
                variance: 490_000.0,
            },
        ],
        1e-9,
    )?;
    let mut document = serde_json::to_value(&model)?;
    document["kind"] = serde_json::Value::from(classifier::CLASSIFICATION_KIND);

    std::fs::create_dir_all(&settings.models_dir)
        .with_context(|| format!("Failed to create {}", settings.models_dir.display()))?;
    let model_path = classifier::model_path(&settings.models_dir, &settings.default_model);
    std::fs::write(&model_path, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("Failed to write {}", model_path.display()))?;
    info!(path = %model_path.display(), "sample model written");
    println!("Sample model written to {}", model_path.display());

    Ok(())
}
