//! Sensor endpoints: ingest from the greenhouse and latest-value query.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::server::payload::{
    format_float_with_unit, format_int_with_unit, sanitize_for_log, truncate_for_log,
    PayloadError, SensorPayload,
};
use crate::server::state::AppState;

/// Acknowledgement returned to the producer.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub subscribers: usize,
    pub received_at: String,
}

/// POST /api/sensor/push - Ingest one reading and fan it out.
pub async fn push_reading(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    let origin = peer
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let payload = match SensorPayload::parse(&body) {
        Ok(payload) => payload,
        Err(PayloadError::Empty) => {
            tracing::warn!(%origin, "Empty request from greenhouse");
            return (StatusCode::BAD_REQUEST, "empty body").into_response();
        }
        Err(PayloadError::InvalidJson(e)) => {
            tracing::error!(
                %origin,
                error = %e,
                payload = %truncate_for_log(&body),
                "Invalid JSON received"
            );
            return (StatusCode::BAD_REQUEST, "invalid JSON").into_response();
        }
    };

    tracing::debug!(%origin, payload = %sanitize_for_log(&body), "Payload received from greenhouse");

    let reading = payload.into_reading();

    tracing::info!(
        kind = %reading.kind,
        timestamp = %reading.timestamp,
        temperature = %format_float_with_unit(reading.temperature, "°C"),
        air_humidity = %format_float_with_unit(reading.air_humidity, "%"),
        luminosity = %format_int_with_unit(reading.luminosity, "%"),
        soil_moisture = %format_int_with_unit(reading.soil_moisture, "%"),
        soil_raw = %format_int_with_unit(reading.soil_raw, ""),
        pump = %reading.pump_status,
        light = %reading.light_status,
        "Reading received from greenhouse"
    );

    match state.broadcaster.publish(reading) {
        Ok(report) => Json(PushResponse {
            status: "received",
            message: "Reading received",
            subscribers: report.delivered,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to publish reading");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to publish reading").into_response()
        }
    }
}

/// GET /api/sensor/latest - The most recent reading, or 204 if none yet.
pub async fn latest_reading(State(state): State<Arc<AppState>>) -> Response {
    match state.broadcaster.store().snapshot() {
        // Same bytes the subscribers received.
        Some(snapshot) => (
            [(header::CONTENT_TYPE, "application/json")],
            snapshot.payload.to_string(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
