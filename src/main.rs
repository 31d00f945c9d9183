use anyhow::{bail, Context, Result};
use price_forecast::{Config, ForecastPipeline, PipelineOutput, SeriesLoader};
use std::env;
use std::path::Path;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Series used when no CSV is given on the command line.
const BUNDLED_SERIES: &str = include_str!("../data/bitcoin.csv");
const DEFAULT_CONFIG_PATH: &str = "config/forecast.yaml";
const PREVIEW_ROWS: usize = 10;

fn main() -> Result<()> {
    let log_level = match env::var("LOG_LEVEL").as_deref() {
        Ok("debug") => Level::DEBUG,
        Ok("warn") => Level::WARN,
        Ok("error") => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Data file and config file from the command line, falling back to the bundled defaults
    let data_path = env::args().nth(1);
    let config_path = env::args()
        .nth(2)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).with_context(|| format!("loading {}", config_path))?
    } else {
        warn!(path = %config_path, "config file not found, using defaults");
        Config::default()
    };

    if config.horizon_days < 1 || config.horizon_days > config.max_horizon_days {
        bail!(
            "horizon_days must be between 1 and {}, got {}",
            config.max_horizon_days,
            config.horizon_days
        );
    }

    let series = match &data_path {
        Some(path) => {
            println!("Loading prices from: {}", path);
            SeriesLoader::from_path(path, config.fold_count)
                .with_context(|| format!("loading {}", path))?
        }
        None => {
            println!("Loading prices from: bundled bitcoin.csv");
            SeriesLoader::from_reader(BUNDLED_SERIES.as_bytes(), config.fold_count)
                .context("loading bundled series")?
        }
    };

    let pipeline = ForecastPipeline::new(config)?;
    let output = pipeline.run(series).context("forecasting")?;

    print_report(&output);
    Ok(())
}

fn print_report(output: &PipelineOutput) {
    println!("\n=== Raw Data Preview ===");
    println!("{:<12} {:>14}", "Date", "Price");
    println!("{:-<27}", "");
    for point in output.historical.tail(PREVIEW_ROWS) {
        println!("{:<12} {:>14.2}", point.date.to_string(), point.price);
    }

    let evaluation = &output.evaluation;
    println!("\n=== Model ===");
    println!("Best parameters:");
    println!("  C:       {}", evaluation.hyperparameters.c);
    println!("  gamma:   {}", evaluation.hyperparameters.gamma);
    println!("  epsilon: {}", evaluation.hyperparameters.epsilon);
    println!("Cross-validated RMSE: {:.2} USD", evaluation.cv_rmse);
    println!("In-sample RMSE:       {:.2} USD", evaluation.rmse);
    println!("In-sample MAE:        {:.2} USD", evaluation.mae);

    println!("\n=== {}-Day Forecast ===", output.forecast.len());
    println!("{:<12} {:>16}", "Date", "Predicted Price");
    println!("{:-<29}", "");
    for point in &output.forecast {
        println!("{:<12} {:>16.2}", point.date.to_string(), point.predicted_price);
    }
}
