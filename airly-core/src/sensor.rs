use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    client::AirlyClient,
    error::Result,
    model::{Attribute, Coordinate, MeasurementPayload, SensorReading},
};

pub const SENSOR_NAME: &str = "Airly air quality";
pub const UNIT: &str = "CAQI";

/// How often the host should call [`Sensor::update`].
pub const SCAN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// What a host needs from a polled sensor entity.
#[async_trait]
pub trait Sensor: Send + Sync {
    fn name(&self) -> &str;

    fn unit(&self) -> &str;

    fn state(&self) -> Option<f64>;

    fn attributes(&self) -> BTreeMap<&'static str, f64>;

    /// Fetch new data. Must not be called again before it returns.
    async fn update(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Fetched {
    payload: Arc<MeasurementPayload>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AirlySensor {
    coordinate: Coordinate,
    client: Arc<AirlyClient>,
    last: RwLock<Option<Fetched>>,
}

impl AirlySensor {
    pub fn new(client: Arc<AirlyClient>, coordinate: Coordinate) -> Self {
        Self { coordinate, client, last: RwLock::new(None) }
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Poll the provider once, replacing the stored payload on success.
    ///
    /// On failure the previous payload stays in place.
    pub async fn refresh(&self) -> Result<()> {
        let Coordinate { latitude, longitude } = self.coordinate;

        let payload = match self.client.get_state(latitude, longitude).await {
            Ok(payload) => payload,
            Err(err) if err.is_transport() => {
                log::warn!("Airly refresh for {} failed: {err}", self.coordinate);
                return Err(err);
            }
            Err(err) => {
                log::error!("Airly refresh for {} returned unusable data: {err}", self.coordinate);
                return Err(err);
            }
        };

        let fetched = Fetched { payload: Arc::new(payload), fetched_at: Utc::now() };
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(fetched);

        log::info!("Airly refresh for {} succeeded", self.coordinate);
        Ok(())
    }

    fn fetched(&self) -> Option<Fetched> {
        self.last.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> Option<f64> {
        self.fetched().and_then(|s| state_of(&s.payload))
    }

    pub fn attributes(&self) -> BTreeMap<&'static str, f64> {
        self.fetched().map(|s| attributes_of(&s.payload)).unwrap_or_default()
    }

    /// State, attributes and index details taken from the same payload.
    pub fn reading(&self) -> SensorReading {
        let Some(fetched) = self.fetched() else {
            return SensorReading::default();
        };
        let payload = &fetched.payload;
        let index = payload.primary_index().ok();

        SensorReading {
            state: index.and_then(|i| i.value),
            attributes: attributes_of(payload),
            level: index.and_then(|i| i.level.clone()),
            description: index.and_then(|i| i.description.clone()),
            advice: index.and_then(|i| i.advice.clone()),
            updated_at: Some(fetched.fetched_at),
        }
    }
}

#[async_trait]
impl Sensor for AirlySensor {
    fn name(&self) -> &str {
        SENSOR_NAME
    }

    fn unit(&self) -> &str {
        UNIT
    }

    fn state(&self) -> Option<f64> {
        AirlySensor::state(self)
    }

    fn attributes(&self) -> BTreeMap<&'static str, f64> {
        AirlySensor::attributes(self)
    }

    async fn update(&self) -> Result<()> {
        self.refresh().await
    }
}

fn state_of(payload: &MeasurementPayload) -> Option<f64> {
    payload.primary_index().ok().and_then(|index| index.value)
}

// Names the provider did not send are left out.
fn attributes_of(payload: &MeasurementPayload) -> BTreeMap<&'static str, f64> {
    let mut attrs = BTreeMap::new();
    for attr in Attribute::all() {
        match payload.value(attr.provider_name()) {
            Ok(value) => {
                attrs.insert(attr.key(), value);
            }
            Err(err) => log::debug!("Omitting attribute {}: {err}", attr.key()),
        }
    }
    attrs
}
