use crate::advisory::AdvisoryContext;
use crate::geo::WithDistance;
use crate::report::{CrowdLevel, Office, OfficeId, ReportId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub office_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OfficesResponse {
    pub offices: Vec<Office>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct NearbyResponse {
    pub radius_km: f64,
    pub offices: Vec<WithDistance<Office>>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CrowdResponse {
    pub office_id: OfficeId,
    pub level: CrowdLevel,
    pub average_wait_minutes: u32,
    pub total_report_count: usize,
    pub user_report_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_label: Option<String>,
    pub window_minutes: u32,
    pub data_source: &'static str,
    pub low_confidence: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AdvisoryContextResponse {
    pub office_id: OfficeId,
    pub context: AdvisoryContext,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReportRequest {
    pub level: CrowdLevel,
    #[serde(default)]
    pub submitter_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SubmitReportResponse {
    pub report_id: ReportId,
    pub office_id: OfficeId,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    OfficeNotFound,
    InvalidRequest,
    InternalError,
}
