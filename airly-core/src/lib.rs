//! Core library for the `airly` air-quality sensor.
//!
//! This crate defines:
//! - Configuration of monitored points and the home location
//! - A client for the Airly point-measurement endpoint
//! - A typed model of the measurement payload
//! - A sensor adapter exposing the CAQI state and its attributes
//!
//! Nothing here touches the network until [`AirlySensor::refresh`] (or
//! [`AirlyClient::get_state`]) is awaited.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod sensor;

pub use client::{AirlyClient, REQUEST_TIMEOUT, Transport};
pub use config::{Config, SensorConfig};
pub use error::{Error, Result};
pub use model::{Attribute, Coordinate, MeasurementPayload, SensorReading};
pub use sensor::{AirlySensor, SCAN_INTERVAL, Sensor};
