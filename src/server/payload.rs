//! Decoding of producer payloads.
//!
//! The greenhouse controller posts loosely-shaped JSON: any field may be
//! missing, and older bridge firmware sends the raw soil value under
//! `umidade_solo_bruto`. This module turns that into a [`Reading`].

use crate::store::Reading;
use serde::Deserialize;
use std::fmt;

/// Stored in text fields the producer left empty.
pub const MISSING_FIELD_PLACEHOLDER: &str = "dado não recebido";

/// Longest slice of a rejected body that is written to the log.
pub const MAX_LOGGED_BODY_BYTES: usize = 1024;

/// Inbound JSON exactly as the producer sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SensorPayload {
    pub tipo: Option<String>,
    pub data_hora: Option<String>,
    pub temperatura: Option<f64>,
    pub umidade_ar: Option<f64>,
    pub luminosidade: Option<i64>,
    pub umidade_solo: Option<i64>,
    pub solo_bruto: Option<i64>,
    /// Legacy name for `solo_bruto`.
    pub umidade_solo_bruto: Option<i64>,
    pub status_bomba: Option<String>,
    pub status_luz: Option<String>,
}

/// Why an ingest body was rejected.
#[derive(Debug)]
pub enum PayloadError {
    Empty,
    InvalidJson(serde_json::Error),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Empty => write!(f, "empty body"),
            PayloadError::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
        }
    }
}

impl std::error::Error for PayloadError {}

impl SensorPayload {
    /// Parses a request body.
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        if body.is_empty() {
            return Err(PayloadError::Empty);
        }
        serde_json::from_slice(body).map_err(PayloadError::InvalidJson)
    }

    /// Normalizes the payload into a reading.
    ///
    /// The legacy raw soil value is only taken when the canonical field is
    /// absent and the legacy value is positive.
    pub fn into_reading(self) -> Reading {
        let soil_raw = match (self.solo_bruto, self.umidade_solo_bruto) {
            (Some(raw), _) => Some(raw),
            (None, Some(legacy)) if legacy > 0 => Some(legacy),
            _ => None,
        };

        Reading {
            kind: or_placeholder(self.tipo),
            timestamp: or_placeholder(self.data_hora),
            temperature: self.temperatura,
            air_humidity: self.umidade_ar,
            luminosity: self.luminosidade,
            soil_moisture: self.umidade_solo,
            soil_raw,
            pump_status: or_placeholder(self.status_bomba),
            light_status: or_placeholder(self.status_luz),
        }
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| MISSING_FIELD_PLACEHOLDER.to_string())
}

/// Replaces control characters (other than line breaks and tabs) with `.`.
pub fn sanitize_for_log(content: &[u8]) -> String {
    let cleaned: Vec<u8> = content
        .iter()
        .map(|&b| {
            if b < 32 && b != b'\n' && b != b'\r' && b != b'\t' {
                b'.'
            } else {
                b
            }
        })
        .collect();
    String::from_utf8_lossy(&cleaned).into_owned()
}

/// Sanitized body, cut to [`MAX_LOGGED_BODY_BYTES`].
pub fn truncate_for_log(content: &[u8]) -> String {
    if content.len() <= MAX_LOGGED_BODY_BYTES {
        return sanitize_for_log(content);
    }
    format!(
        "{}...(truncated)",
        sanitize_for_log(&content[..MAX_LOGGED_BODY_BYTES])
    )
}

/// `22.3°C`, or the placeholder when the value is missing.
pub fn format_float_with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => MISSING_FIELD_PLACEHOLDER.to_string(),
    }
}

/// `80%`, or the placeholder when the value is missing.
pub fn format_int_with_unit(value: Option<i64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => MISSING_FIELD_PLACEHOLDER.to_string(),
    }
}
