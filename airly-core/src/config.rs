use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{error::Error, model::Coordinate};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "AIRLY_CONFIG";

/// One monitored point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Get one from https://developer.airly.eu/api
    pub api_key: String,

    /// Falls back to the home latitude when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    /// Falls back to the home longitude when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl SensorConfig {
    /// Resolve this sensor's coordinate, axis by axis, against `home`.
    pub fn coordinate(&self, home: Option<Coordinate>) -> crate::Result<Coordinate> {
        let latitude = self
            .latitude
            .or(home.map(|h| h.latitude))
            .ok_or_else(|| Error::Config("no latitude configured and no home location set".into()))?;
        let longitude = self
            .longitude
            .or(home.map(|h| h.longitude))
            .ok_or_else(|| Error::Config("no longitude configured and no home location set".into()))?;

        Coordinate::new(latitude, longitude)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [home]
/// latitude = 50.06
/// longitude = 19.94
///
/// [[sensors]]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Host location used when a sensor has no coordinate of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<Coordinate>,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let dirs = ProjectDirs::from("eu", "airly", "airly")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Append a sensor after checking it can be resolved against the home location.
    pub fn add_sensor(&mut self, sensor: SensorConfig) -> Result<()> {
        if sensor.api_key.trim().is_empty() {
            return Err(anyhow!("API key must not be empty"));
        }
        sensor.coordinate(self.home)?;
        self.sensors.push(sensor);
        Ok(())
    }

    /// API key and resolved coordinate of every configured sensor.
    pub fn resolved_sensors(&self) -> Result<Vec<(String, Coordinate)>> {
        self.sensors
            .iter()
            .enumerate()
            .map(|(i, sensor)| {
                let coordinate = sensor
                    .coordinate(self.home)
                    .with_context(|| format!("Invalid sensor #{}", i + 1))?;
                Ok((sensor.api_key.clone(), coordinate))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if let Some(home) = self.home {
            Coordinate::new(home.latitude, home.longitude).context("Invalid home location")?;
        }
        self.resolved_sensors()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> Coordinate {
        Coordinate::new(50.06, 19.94).unwrap()
    }

    #[test]
    fn sensor_coordinate_defaults_to_home() {
        let sensor = SensorConfig { api_key: "KEY".into(), latitude: None, longitude: None };
        assert_eq!(sensor.coordinate(Some(home())).unwrap(), home());
    }

    #[test]
    fn sensor_coordinate_overrides_axis_by_axis() {
        let sensor = SensorConfig { api_key: "KEY".into(), latitude: Some(52.23), longitude: None };
        let coordinate = sensor.coordinate(Some(home())).unwrap();

        assert_eq!(coordinate.latitude, 52.23);
        assert_eq!(coordinate.longitude, 19.94);
    }

    #[test]
    fn sensor_coordinate_errors_without_home() {
        let sensor = SensorConfig { api_key: "KEY".into(), latitude: Some(52.23), longitude: None };
        let err = sensor.coordinate(None).unwrap_err();
        assert!(err.to_string().contains("no longitude configured"));
    }

    #[test]
    fn parse_reads_home_and_sensors() {
        let cfg = Config::parse(
            r#"
            [home]
            latitude = 50.06
            longitude = 19.94

            [[sensors]]
            api_key = "A"

            [[sensors]]
            api_key = "B"
            latitude = 52.23
            longitude = 21.01
            "#,
        )
        .unwrap();

        let resolved = cfg.resolved_sensors().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], ("A".to_string(), home()));
        assert_eq!(resolved[1].1, Coordinate::new(52.23, 21.01).unwrap());
    }

    #[test]
    fn parse_rejects_out_of_range_latitude() {
        let err = Config::parse(
            r#"
            [[sensors]]
            api_key = "A"
            latitude = 123.0
            longitude = 123.0
            "#,
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("latitude 123 is out of range"));
    }

    #[test]
    fn add_sensor_requires_api_key_and_location() {
        let mut cfg = Config::default();

        let blank = SensorConfig { api_key: "  ".into(), latitude: Some(1.0), longitude: Some(1.0) };
        assert!(cfg.add_sensor(blank).is_err());

        let nowhere = SensorConfig { api_key: "KEY".into(), latitude: None, longitude: None };
        assert!(cfg.add_sensor(nowhere.clone()).is_err());

        cfg.home = Some(home());
        cfg.add_sensor(nowhere).unwrap();
        assert_eq!(cfg.sensors.len(), 1);
    }

    #[test]
    fn saved_toml_omits_unset_coordinates() {
        let mut cfg = Config { home: Some(home()), sensors: Vec::new() };
        cfg.add_sensor(SensorConfig { api_key: "KEY".into(), latitude: None, longitude: None })
            .unwrap();

        let toml = toml::to_string_pretty(&cfg).unwrap();
        assert!(toml.contains("[[sensors]]"));
        assert_eq!(toml.matches("latitude").count(), 1);
        assert_eq!(Config::parse(&toml).unwrap().sensors, cfg.sensors);
    }
}
