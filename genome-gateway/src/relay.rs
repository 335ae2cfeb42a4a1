//! Relay to the external prediction services.
//!
//! Two microservices sit behind the gateway: a cancer-risk predictor and the
//! BioSync biomarker service. Inputs are range-checked here so malformed
//! submissions never leave the process; upstream replies are forwarded as
//! typed JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use genome_common::config::RelayConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Relay failures.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("{detail}")]
    Upstream { status: u16, detail: String },

    #[error("Prediction service unreachable: {0}")]
    Transport(String),

    #[error("Invalid response from prediction service: {0}")]
    InvalidResponse(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            RelayError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            RelayError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            RelayError::Transport(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            RelayError::InvalidResponse(_) => {
                (StatusCode::BAD_GATEWAY, "INVALID_UPSTREAM_RESPONSE")
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Human-readable detail for a non-2xx upstream reply.
///
/// Prefers the `detail` field of a JSON body; falls back to the status code.
pub fn error_detail(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    match detail {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::String(_) | serde_json::Value::Null) | None => {
            format!("HTTP error! status: {status}")
        }
        Some(other) => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancer risk
// ─────────────────────────────────────────────────────────────────────────────

/// Genomic and clinical markers submitted for a cancer-risk prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancerRiskInput {
    #[serde(rename = "TP53")]
    pub tp53: f64,
    #[serde(rename = "BRCA1")]
    pub brca1: f64,
    #[serde(rename = "EGFR")]
    pub egfr: f64,
    #[serde(rename = "MYC")]
    pub myc: f64,
    pub age: f64,
    pub bmi: f64,
    pub smoking_history: f64,
    pub family_history: f64,
    pub previous_cancer_history: f64,
    pub inflammatory_markers: f64,
}

impl CancerRiskInput {
    fn ranges(&self) -> [(&'static str, f64, f64, f64); 10] {
        [
            ("TP53", self.tp53, 0.0, 15.0),
            ("BRCA1", self.brca1, 0.0, 15.0),
            ("EGFR", self.egfr, 0.0, 15.0),
            ("MYC", self.myc, 0.0, 15.0),
            ("age", self.age, 18.0, 120.0),
            ("bmi", self.bmi, 12.0, 50.0),
            ("smoking_history", self.smoking_history, 0.0, 1.0),
            ("family_history", self.family_history, 0.0, 1.0),
            ("previous_cancer_history", self.previous_cancer_history, 0.0, 1.0),
            ("inflammatory_markers", self.inflammatory_markers, 0.0, 20.0),
        ]
    }

    /// Check every field against its accepted range, reporting the first failure.
    pub fn validate(&self) -> Result<(), RelayError> {
        for (field, value, min, max) in self.ranges() {
            if !value.is_finite() || value < min || value > max {
                return Err(RelayError::Validation(format!(
                    "{field}: Value must be between {min} and {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Prediction returned by the cancer-risk service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancerPrediction {
    pub cancer_risk_percentage: f64,
    pub risk_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survival_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survival_months: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

/// Coarse band for a risk percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskBand {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 25.0 {
            Self::Low
        } else if percentage < 50.0 {
            Self::Moderate
        } else if percentage < 75.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// Prediction plus the derived band, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    #[serde(flatten)]
    pub prediction: CancerPrediction,
    pub risk_band: RiskBand,
}

// ─────────────────────────────────────────────────────────────────────────────
// Biomarkers
// ─────────────────────────────────────────────────────────────────────────────

fn default_user_id() -> String {
    "user_001".into()
}

/// One set of wearable/lab biomarker readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerReading {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub glucose: f64,
    pub hrv: f64,
    pub cortisol: f64,
    pub sleep_quality: f64,
    pub neuro_fatigue: f64,
}

impl BiomarkerReading {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.user_id.trim().is_empty() {
            return Err(RelayError::Validation("user_id: must not be empty".into()));
        }
        for (field, value) in [
            ("glucose", self.glucose),
            ("hrv", self.hrv),
            ("cortisol", self.cortisol),
            ("sleep_quality", self.sleep_quality),
            ("neuro_fatigue", self.neuro_fatigue),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RelayError::Validation(format!(
                    "{field}: Value must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Case-insensitive parse; anything unrecognised is `Medium`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Priority::parse(&s),
            _ => Priority::Medium,
        })
    }
}

/// A recommended action for one out-of-range biomarker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub biomarker: String,
    pub intervention: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionReport {
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

/// Reachability of the BioSync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Connected,
    Disconnected,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for both prediction services.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    cancer_endpoint: String,
    biosync_endpoint: String,
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            cancer_endpoint: config.cancer_endpoint.trim_end_matches('/').to_string(),
            biosync_endpoint: config.biosync_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Validate and submit a cancer-risk prediction.
    pub async fn predict_cancer(&self, input: &CancerRiskInput) -> Result<RiskAssessment, RelayError> {
        input.validate()?;

        let url = format!("{}/predict", self.cancer_endpoint);
        tracing::debug!(url = %url, "Requesting cancer risk prediction");

        let response = self.client.post(&url).json(input).send().await.map_err(|e| {
            tracing::error!(error = %e, "Cancer prediction request failed");
            RelayError::Transport(e.to_string())
        })?;

        let prediction: CancerPrediction = read_json(response).await?;
        let risk_band = RiskBand::from_percentage(prediction.cancer_risk_percentage);

        tracing::info!(
            risk_percentage = prediction.cancer_risk_percentage,
            risk_band = ?risk_band,
            "Cancer risk prediction completed"
        );

        Ok(RiskAssessment {
            prediction,
            risk_band,
        })
    }

    /// Validate and submit biomarker readings for intervention analysis.
    pub async fn process_biomarkers(
        &self,
        reading: &BiomarkerReading,
    ) -> Result<InterventionReport, RelayError> {
        reading.validate()?;

        let url = format!("{}/process-biomarkers", self.biosync_endpoint);
        let response = self.client.post(&url).json(reading).send().await.map_err(|e| {
            tracing::error!(error = %e, "Biomarker processing request failed");
            RelayError::Transport(e.to_string())
        })?;

        let report: InterventionReport = read_json(response).await?;
        tracing::info!(
            user_id = %reading.user_id,
            interventions = report.interventions.len(),
            "Biomarkers processed"
        );
        Ok(report)
    }

    /// Probe the BioSync health endpoint. Never fails.
    pub async fn biosync_status(&self) -> ServiceStatus {
        let url = format!("{}/health", self.biosync_endpoint);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => ServiceStatus::Connected,
            Ok(r) => {
                tracing::warn!(status = r.status().as_u16(), "BioSync health check failed");
                ServiceStatus::Disconnected
            }
            Err(e) => {
                tracing::warn!(error = %e, "BioSync unreachable");
                ServiceStatus::Disconnected
            }
        }
    }

    /// Fetch the BioSync dashboard snapshot as-is.
    pub async fn dashboard(&self) -> Result<serde_json::Value, RelayError> {
        let url = format!("{}/dashboard/data", self.biosync_endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RelayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), detail = %detail, "Prediction service returned an error");
        return Err(RelayError::Upstream {
            status: status.as_u16(),
            detail,
        });
    }

    response.json::<T>().await.map_err(|e| {
        tracing::warn!(error = %e, "Prediction service reply did not decode");
        RelayError::InvalidResponse(e.to_string())
    })
}
