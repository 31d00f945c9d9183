use chrono::NaiveDate;
use price_forecast::data::DataError;
use price_forecast::evaluation;
use price_forecast::features::encode;
use price_forecast::model::{SolverSettings, Trainer, TrainerConfig};
use price_forecast::{
    Config, ErrorKind, ForecastPipeline, HyperparameterGrid, ObservedPoint, ObservedSeries,
    SeriesLoader,
};
use std::io::Write;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn btc_week() -> Vec<ObservedPoint> {
    [29200.0, 32100.0, 33000.0, 31500.0, 34200.0, 35000.0]
        .iter()
        .enumerate()
        .map(|(i, &price)| ObservedPoint::new(date(2021, 1, 1 + i as u32), price))
        .collect()
}

#[test]
fn test_six_day_example() {
    let config = Config {
        fold_count: 2,
        horizon_days: 2,
        ..Config::default()
    };
    let series = ObservedSeries::new(btc_week(), config.fold_count).expect("valid series");
    let output = ForecastPipeline::new(config)
        .expect("valid config")
        .run(series)
        .expect("pipeline failed");

    assert!(output.evaluation.rmse.is_finite());
    assert!(output.evaluation.rmse >= 0.0);
    assert!(output.evaluation.cv_rmse.is_finite());

    let dates: Vec<_> = output.forecast.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![date(2021, 1, 7), date(2021, 1, 8)]);
    assert_eq!(output.historical.len(), 6);
}

#[test]
fn test_negative_price_is_parse_error() {
    let csv = "Date,Price\n2021-01-01,-5\n";
    let err = SeriesLoader::from_reader(csv.as_bytes(), 5).unwrap_err();
    assert!(matches!(err, DataError::Parse { row: 2, field: "price", .. }));

    let err = ObservedSeries::new(vec![ObservedPoint::new(date(2021, 1, 1), -5.0)], 5).unwrap_err();
    assert!(matches!(err, DataError::Parse { .. }));
}

#[test]
fn test_three_rows_five_folds_is_insufficient() {
    let points = btc_week().into_iter().take(3).collect();
    let err = ObservedSeries::new(points, 5).unwrap_err();
    assert!(matches!(
        err,
        DataError::InsufficientData {
            required: 6,
            got: 3
        }
    ));

    let pipeline_err: price_forecast::PipelineError = err.into();
    assert_eq!(pipeline_err.kind(), ErrorKind::InsufficientData);
}

#[test]
fn test_invalid_horizon_produces_no_forecast() {
    let config = Config {
        fold_count: 2,
        ..Config::default()
    };
    let pipeline = ForecastPipeline::new(config).unwrap();
    for horizon in [0, -1] {
        let series = ObservedSeries::new(btc_week(), 2).unwrap();
        let err = pipeline.run_with_horizon(series, horizon).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHorizon);
    }
}

#[test]
fn test_loads_fixture_newest_first() {
    let series = SeriesLoader::from_path("tests/data/sample_prices.csv", 5).expect("fixture loads");

    assert_eq!(series.len(), 40);
    assert_eq!(series.first_date(), date(2021, 1, 1));
    assert_eq!(series.last_date(), date(2021, 2, 9));
    for pair in series.points().windows(2) {
        assert!(pair[0].date < pair[1].date);
    }
}

#[test]
fn test_bundled_series_loads() {
    let series = SeriesLoader::from_path("data/bitcoin.csv", 5).expect("bundled series loads");

    assert_eq!(series.len(), 180);
    assert_eq!(series.first_date(), date(2020, 7, 1));
    assert_eq!(series.last_date(), date(2020, 12, 27));
    assert!(series.prices().iter().all(|p| *p > 0.0));
}

#[test]
fn test_solver_failure_surfaces_as_convergence() {
    let points = (0..12)
        .map(|i| {
            let price = if i % 2 == 0 { 1e308 } else { 1.0 };
            ObservedPoint::new(date(2021, 1, 1) + chrono::Duration::days(i), price)
        })
        .collect();
    let config = Config {
        fold_count: 2,
        hyperparameter_grid: HyperparameterGrid::new(vec![0.1], vec![1e300], vec![0.1]),
        solver: SolverSettings {
            max_iterations: 0,
            ..SolverSettings::default()
        },
        ..Config::default()
    };

    let series = ObservedSeries::new(points, config.fold_count).unwrap();
    let err = ForecastPipeline::new(config).unwrap().run(series).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Convergence);
}

#[test]
fn test_horizon_past_calendar_end_is_rejected() {
    let config = Config {
        fold_count: 2,
        ..Config::default()
    };
    let series = ObservedSeries::new(btc_week(), 2).unwrap();
    let err = ForecastPipeline::new(config)
        .unwrap()
        .run_with_horizon(series, i64::MAX)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHorizon);
}

#[test]
fn test_run_csv_forecasts_after_last_date() {
    let config = Config {
        horizon_days: 7,
        ..Config::default()
    };
    let output = ForecastPipeline::new(config)
        .unwrap()
        .run_csv("tests/data/sample_prices.csv")
        .expect("pipeline failed");

    assert_eq!(output.forecast.len(), 7);
    assert_eq!(output.forecast[0].date, date(2021, 2, 10));
    for pair in output.forecast.windows(2) {
        assert_eq!(pair[1].date - pair[0].date, chrono::Duration::days(1));
        assert_eq!(pair[1].ordinal, pair[0].ordinal + 1);
    }
    let chosen = output.evaluation.hyperparameters;
    assert!(HyperparameterGrid::default().points().contains(&chosen));
}

#[test]
fn test_missing_column_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Day,Close").unwrap();
    writeln!(file, "2021-01-01,100").unwrap();

    let pipeline = ForecastPipeline::new(Config::default()).unwrap();
    let err = pipeline.run_csv(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn test_config_file_roundtrip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "horizon_days: 3").unwrap();
    writeln!(file, "fold_count: 2").unwrap();
    writeln!(file, "parallel: false").unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.horizon_days, 3);
    assert_eq!(config.fold_count, 2);
    assert!(!config.parallel);
    assert_eq!(config.max_horizon_days, 30);
}

fn wave_samples() -> Vec<price_forecast::features::EncodedSample> {
    let points: Vec<ObservedPoint> = (0..24)
        .map(|i| {
            let price = 10.0 + 0.3 * i as f64 + 2.0 * (i as f64 / 3.0).sin();
            ObservedPoint::new(date(2021, 3, 1) + chrono::Duration::days(i), price)
        })
        .collect();
    encode(&ObservedSeries::new(points, 3).unwrap()).samples
}

#[test]
fn test_in_sample_error_shrinks_with_capacity() {
    let samples = wave_samples();
    let fit = |gamma: f64, c: f64, epsilon: f64| {
        let config = TrainerConfig {
            grid: HyperparameterGrid::new(vec![gamma], vec![c], vec![epsilon]),
            fold_count: 3,
            ..TrainerConfig::default()
        };
        let model = Trainer::new(config).train(&samples).unwrap();
        evaluation::evaluate(&model, &samples).unwrap().rmse
    };

    let low = fit(0.001, 1.0, 0.5);
    let high = fit(1.0, 1000.0, 0.001);

    assert!(high < low);
    assert!(high < 0.01, "high-capacity rmse {}", high);
}

#[test]
fn test_selection_ignores_grid_order() {
    let samples = wave_samples();
    let train = |grid: HyperparameterGrid| {
        Trainer::new(TrainerConfig {
            grid,
            fold_count: 3,
            ..TrainerConfig::default()
        })
        .train(&samples)
        .unwrap()
        .hyperparameters()
    };

    let forward = train(HyperparameterGrid::new(
        vec![0.01, 0.1, 1.0],
        vec![1.0, 10.0, 100.0],
        vec![0.05, 0.2],
    ));
    let reversed = train(HyperparameterGrid::new(
        vec![1.0, 0.1, 0.01],
        vec![100.0, 10.0, 1.0],
        vec![0.2, 0.05],
    ));
    assert_eq!(forward, reversed);
}

#[test]
fn test_tied_candidates_keep_first_enumerated() {
    // A tube wider than the target range leaves every candidate predicting the
    // same constant, so all gammas tie
    let samples = wave_samples();
    let train = |gamma: Vec<f64>| {
        Trainer::new(TrainerConfig {
            grid: HyperparameterGrid::new(gamma, vec![1.0], vec![1e6]),
            fold_count: 3,
            ..TrainerConfig::default()
        })
        .train(&samples)
        .unwrap()
        .hyperparameters()
        .gamma
    };

    assert_eq!(train(vec![0.5, 0.1]), 0.5);
    assert_eq!(train(vec![0.1, 0.5]), 0.1);
}
