//! Data types for sensor readings.
//!
//! Defines the reading snapshot shared between the ingest path, the
//! latest-value store and every subscriber connection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A snapshot of greenhouse sensor state at one point in time.
///
/// Every field is carried as-is: no unit conversion, range checks or
/// interpretation happen anywhere in the hub. Readings are replaced
/// wholesale on each ingest, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Classification tag of the payload (e.g. "leituras").
    #[serde(rename = "tipo")]
    pub kind: String,

    /// Producer-supplied timestamp. Opaque, never parsed.
    #[serde(rename = "data_hora")]
    pub timestamp: String,

    /// Air temperature in °C.
    #[serde(rename = "temperatura")]
    pub temperature: Option<f64>,

    /// Relative air humidity in %.
    #[serde(rename = "umidade_ar")]
    pub air_humidity: Option<f64>,

    /// Luminosity, nominally 0-100.
    #[serde(rename = "luminosidade")]
    pub luminosity: Option<i64>,

    /// Calibrated soil moisture in %.
    #[serde(rename = "umidade_solo")]
    pub soil_moisture: Option<i64>,

    /// Raw ADC value of the soil moisture sensor.
    #[serde(rename = "solo_bruto")]
    pub soil_raw: Option<i64>,

    /// Free-form pump status.
    #[serde(rename = "status_bomba")]
    pub pump_status: String,

    /// Free-form grow light status.
    #[serde(rename = "status_luz")]
    pub light_status: String,
}

/// A serialized reading, shared by reference between all subscriber queues.
pub type Payload = Arc<str>;

/// The latest reading together with the exact bytes that were broadcast for it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub reading: Arc<Reading>,
    pub payload: Payload,
}

impl Snapshot {
    /// Serializes `reading` into its wire form.
    pub fn encode(reading: Reading) -> Result<Self, serde_json::Error> {
        let payload: Payload = serde_json::to_string(&reading)?.into();
        Ok(Self {
            reading: Arc::new(reading),
            payload,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_reading(temperature: f64) -> Reading {
    Reading {
        kind: "leituras".to_string(),
        timestamp: "16/10/2026 10:00:00".to_string(),
        temperature: Some(temperature),
        air_humidity: Some(61.5),
        luminosity: Some(80),
        soil_moisture: Some(42),
        soil_raw: Some(2710),
        pump_status: "Bomba desativada".to_string(),
        light_status: "Luz ligada".to_string(),
    }
}
