use std::sync::Arc;

use airly_core::{
    AirlyClient, AirlySensor, Config, Coordinate, REQUEST_TIMEOUT, SCAN_INTERVAL, Sensor,
    SensorConfig, client::http,
};
use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Password};
use tokio::time::MissedTickBehavior;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "airly", version, about = "Airly air-quality sensor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a monitored point and, optionally, set the home location.
    Configure,

    /// Refresh every sensor once and print the readings.
    Show {
        /// Query a single ad-hoc point with this API key instead of the configured sensors.
        #[arg(long)]
        api_key: Option<String>,

        /// Latitude of the ad-hoc point; defaults to the home location.
        #[arg(long, requires = "api_key", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of the ad-hoc point; defaults to the home location.
        #[arg(long, requires = "api_key", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Refresh every sensor on registration and every 5 minutes after, until Ctrl-C.
    Watch,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { api_key, lat, lon } => {
                let config = Config::load()?;
                let sensors = match api_key {
                    Some(api_key) => {
                        let adhoc = SensorConfig { api_key, latitude: lat, longitude: lon };
                        register(&[(adhoc.api_key.clone(), adhoc.coordinate(config.home)?)])?
                    }
                    None => register(&configured(&config)?)?,
                };
                show(&sensors).await
            }
            Command::Watch => {
                let config = Config::load()?;
                let sensors = register(&configured(&config)?)?;
                watch(sensors).await
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let set_home = Confirm::new("Set the home location?")
        .with_default(config.home.is_none())
        .prompt()?;
    if set_home {
        let latitude = CustomType::<f64>::new("Home latitude:").prompt()?;
        let longitude = CustomType::<f64>::new("Home longitude:").prompt()?;
        config.home = Some(Coordinate::new(latitude, longitude)?);
    }

    let api_key = Password::new("Airly API key:")
        .without_confirmation()
        .with_help_message("Get one from https://developer.airly.eu/api")
        .prompt()?;
    let latitude = CustomType::<f64>::new("Sensor latitude:")
        .with_help_message("Esc to use the home location")
        .prompt_skippable()?;
    let longitude = CustomType::<f64>::new("Sensor longitude:")
        .with_help_message("Esc to use the home location")
        .prompt_skippable()?;

    config.add_sensor(SensorConfig { api_key, latitude, longitude })?;
    config.save()?;

    println!(
        "Saved {} sensor(s) to {}",
        config.sensors.len(),
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn configured(config: &Config) -> anyhow::Result<Vec<(String, Coordinate)>> {
    let sensors = config.resolved_sensors()?;
    if sensors.is_empty() {
        return Err(anyhow!(
            "No sensors configured.\n\
             Hint: run `airly configure` first, or pass --api-key."
        ));
    }
    Ok(sensors)
}

/// One sensor per point, all sharing a single HTTP session.
fn register(points: &[(String, Coordinate)]) -> anyhow::Result<Vec<Arc<AirlySensor>>> {
    let session = http::session(REQUEST_TIMEOUT).context("Failed to create HTTP session")?;

    Ok(points
        .iter()
        .map(|(api_key, coordinate)| {
            let client = AirlyClient::with_session(api_key.clone(), session.clone());
            Arc::new(AirlySensor::new(Arc::new(client), *coordinate))
        })
        .collect())
}

async fn show(sensors: &[Arc<AirlySensor>]) -> anyhow::Result<()> {
    let mut failed = 0;
    for sensor in sensors {
        if let Err(err) = sensor.update().await {
            eprintln!("{}: {err}", sensor.coordinate());
            failed += 1;
            continue;
        }
        print_reading(sensor);
    }

    if failed == sensors.len() {
        return Err(anyhow!("All {failed} refresh(es) failed"));
    }
    Ok(())
}

async fn watch(sensors: Vec<Arc<AirlySensor>>) -> anyhow::Result<()> {
    let mut tasks = tokio::task::JoinSet::new();

    for sensor in sensors {
        tasks.spawn(async move {
            let mut interval = tokio::time::interval(SCAN_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // First tick completes immediately: the registration refresh.
                interval.tick().await;
                if sensor.update().await.is_ok() {
                    print_reading(&sensor);
                }
            }
        });
    }

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    log::info!("Shutting down");
    tasks.shutdown().await;
    Ok(())
}

fn print_reading(sensor: &AirlySensor) {
    let reading = sensor.reading();

    let state = reading
        .state
        .map(|v| format!("{v} {}", sensor.unit()))
        .unwrap_or_else(|| "unknown".to_string());
    println!("{} @ {}: {state}", sensor.name(), sensor.coordinate());

    if let Some(level) = &reading.level {
        println!("  level: {level}");
    }
    for (key, value) in &reading.attributes {
        println!("  {key}: {value}");
    }
    if let Some(advice) = reading.advice.as_deref().or(reading.description.as_deref()) {
        println!("  {advice}");
    }
    if let Some(at) = reading.updated_at {
        println!("  updated: {}", at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    }
}
