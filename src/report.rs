//! Report and office data model.
//!
//! Reports are immutable once constructed; the aggregation engine only reads them.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type OfficeId = String;
pub type ReportId = String;

/// Perceived congestion, ordered from least to most crowded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    /// Canonical wait time associated with a level.
    pub fn canonical_wait_minutes(self) -> u32 {
        match self {
            CrowdLevel::Low => 10,
            CrowdLevel::Medium => 30,
            CrowdLevel::High => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrowdLevel::Low => "low",
            CrowdLevel::Medium => "medium",
            CrowdLevel::High => "high",
        }
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust tier of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    /// Live citizen submission.
    #[default]
    User,
    /// Bootstrap data loaded with the office catalogue.
    Seed,
    /// Synthetic data produced by the system itself.
    System,
}

impl ReportSource {
    pub fn is_user(self) -> bool {
        matches!(self, ReportSource::User)
    }

    /// Vote weight: user reports count double.
    pub fn weight(self) -> u64 {
        match self {
            ReportSource::User => 2,
            ReportSource::Seed | ReportSource::System => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub office_id: OfficeId,
    pub level: CrowdLevel,
    /// Milliseconds since the Unix epoch. `None` when the upstream value was
    /// missing or malformed; the engine reads it as "now".
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<String>,
    #[serde(default)]
    pub source: ReportSource,
}

impl Report {
    pub fn new(
        id: impl Into<ReportId>,
        office_id: impl Into<OfficeId>,
        level: CrowdLevel,
        timestamp: u64,
        source: ReportSource,
    ) -> Self {
        Self {
            id: id.into(),
            office_id: office_id.into(),
            level,
            timestamp: Some(timestamp),
            submitter_id: None,
            source,
        }
    }

    pub fn with_submitter(mut self, submitter_id: impl Into<String>) -> Self {
        self.submitter_id = Some(submitter_id.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.submitter_id.is_none()
    }

    /// Timestamp used for windowing and recency, substituting `now` when unknown.
    pub fn effective_timestamp(&self, now: u64) -> u64 {
        self.timestamp.unwrap_or(now)
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let timestamp = match value {
        Some(serde_json::Value::Number(number)) => number.as_u64(),
        Some(serde_json::Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(timestamp)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficeKind {
    Passport,
    Aadhaar,
    DrivingLicense,
    RationCard,
    BirthCertificate,
    PoliceStation,
    MunicipalCorporation,
    Other,
}

impl OfficeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OfficeKind::Passport => "passport",
            OfficeKind::Aadhaar => "aadhaar",
            OfficeKind::DrivingLicense => "driving_license",
            OfficeKind::RationCard => "ration_card",
            OfficeKind::BirthCertificate => "birth_certificate",
            OfficeKind::PoliceStation => "police_station",
            OfficeKind::MunicipalCorporation => "municipal_corporation",
            OfficeKind::Other => "other",
        }
    }
}

/// A location that receives crowd reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub name: String,
    pub kind: OfficeKind,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
