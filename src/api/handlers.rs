use crate::advisory::AdvisoryContext;
use crate::aggregation::{AggregationResult, now_millis};
use crate::api::responses::{
    AdvisoryContextResponse, CrowdResponse, ErrorCode, ErrorResponse, HealthResponse,
    HealthStatus, NearbyResponse, OfficesResponse, SubmitReportRequest, SubmitReportResponse,
};
use crate::error::AppError;
use crate::format::format_age;
use crate::geo::find_within_radius;
use crate::report::OfficeKind;
use crate::state::AppState;
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

type SharedState = Arc<RwLock<AppState>>;

#[derive(Debug)]
enum TimestampError {
    Range(time::error::ComponentRange),
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Range(err) => write!(f, "timestamp out of range: {err}"),
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success {
        status: StatusCode,
        body: T,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OfficesQuery {
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<OfficeKind>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrowdQuery {
    pub window_minutes: Option<u32>,
}

pub async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    build_health_response(state, now_millis())
}

pub async fn get_offices(
    State(state): State<SharedState>,
    Query(query): Query<OfficesQuery>,
) -> impl IntoResponse {
    build_offices_response(state, query, now_millis())
}

pub async fn get_nearby_offices(
    State(state): State<SharedState>,
    Query(query): Query<NearbyQuery>,
) -> impl IntoResponse {
    build_nearby_response(state, query, now_millis())
}

pub async fn get_crowd(
    State(state): State<SharedState>,
    Path(office_id): Path<String>,
    Query(query): Query<CrowdQuery>,
) -> impl IntoResponse {
    build_crowd_response(state, &office_id, query, now_millis())
}

pub async fn get_advisory_context(
    State(state): State<SharedState>,
    Path(office_id): Path<String>,
) -> impl IntoResponse {
    build_advisory_context_response(state, &office_id, now_millis())
}

pub async fn post_report(
    State(state): State<SharedState>,
    Path(office_id): Path<String>,
    Json(request): Json<SubmitReportRequest>,
) -> impl IntoResponse {
    build_submit_report_response(state, &office_id, request, now_millis())
}

fn build_health_response(state: SharedState, now: u64) -> ApiResponse<HealthResponse> {
    let office_count = match state.read() {
        Ok(guard) => guard.store().offices().len(),
        Err(_) => return internal_error("state lock poisoned while reading offices"),
    };

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: HealthResponse {
                status: HealthStatus::Ok,
                office_count,
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn build_offices_response(
    state: SharedState,
    query: OfficesQuery,
    now: u64,
) -> ApiResponse<OfficesResponse> {
    let city = match query.city.as_deref().map(str::trim) {
        Some(city) if !city.is_empty() => city.to_string(),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "Query parameter 'city' is required",
                now,
            );
        }
    };

    let offices = match state.read() {
        Ok(guard) => guard.store().offices_by_city(&city, query.kind),
        Err(_) => return internal_error("state lock poisoned while reading offices"),
    };

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: OfficesResponse { offices, timestamp },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn build_nearby_response(
    state: SharedState,
    query: NearbyQuery,
    now: u64,
) -> ApiResponse<NearbyResponse> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "Coordinates out of range",
            now,
        );
    }

    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while reading offices"),
    };
    let radius_km = query
        .radius_km
        .unwrap_or(guard.settings().default_radius_km);
    if !radius_km.is_finite() || radius_km < 0.0 {
        drop(guard);
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "radius_km must be a non-negative number",
            now,
        );
    }
    let offices = guard.store().offices();
    drop(guard);

    let nearby = find_within_radius(query.lat, query.lon, offices, radius_km);

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: NearbyResponse {
                radius_km,
                offices: nearby,
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn build_crowd_response(
    state: SharedState,
    office_id: &str,
    query: CrowdQuery,
    now: u64,
) -> ApiResponse<CrowdResponse> {
    if query.window_minutes == Some(0) {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "window_minutes must be greater than zero",
            now,
        );
    }

    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while aggregating"),
    };
    let window_minutes = query
        .window_minutes
        .unwrap_or(guard.settings().window_minutes);
    let aggregated = guard.aggregate_office(office_id, window_minutes, now);
    drop(guard);

    let result = match aggregated {
        Ok(result) => result,
        Err(AppError::Store(StoreError::UnknownOffice(_))) => {
            return office_not_found(office_id, now);
        }
        Err(err) => {
            error!(office_id, error = %err, "Aggregation failed");
            return internal_error("aggregation failure");
        }
    };

    match crowd_body(office_id, &result, now) {
        Ok(body) => ApiResponse::Success {
            status: StatusCode::OK,
            body,
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn crowd_body(
    office_id: &str,
    result: &AggregationResult,
    now: u64,
) -> Result<CrowdResponse, TimestampError> {
    let last_updated_at = result.last_updated_at.map(format_timestamp).transpose()?;
    Ok(CrowdResponse {
        office_id: office_id.to_string(),
        level: result.level,
        average_wait_minutes: result.average_wait_minutes,
        total_report_count: result.total_report_count,
        user_report_count: result.user_report_count,
        last_updated_at,
        last_updated_label: result
            .last_updated_at
            .map(|updated| format_age(updated, now)),
        window_minutes: result.window_minutes,
        data_source: result.data_source(),
        low_confidence: result.is_low_confidence(),
        timestamp: format_timestamp(now)?,
    })
}

fn build_advisory_context_response(
    state: SharedState,
    office_id: &str,
    now: u64,
) -> ApiResponse<AdvisoryContextResponse> {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while aggregating"),
    };
    let Some(office) = guard.store().office(office_id) else {
        drop(guard);
        return office_not_found(office_id, now);
    };
    let aggregated = guard.aggregate_office(office_id, guard.settings().window_minutes, now);
    drop(guard);

    let result = match aggregated {
        Ok(result) => result,
        Err(err) => {
            error!(office_id, error = %err, "Aggregation failed");
            return internal_error("aggregation failure");
        }
    };

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: AdvisoryContextResponse {
                office_id: office.id.clone(),
                context: AdvisoryContext::from_result(&office, &result, now),
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn build_submit_report_response(
    state: SharedState,
    office_id: &str,
    request: SubmitReportRequest,
    now: u64,
) -> ApiResponse<SubmitReportResponse> {
    let submitter_id = request
        .submitter_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let submitted = match state.write() {
        Ok(mut guard) => guard.submit_report(office_id, request.level, submitter_id, now),
        Err(_) => return internal_error("state lock poisoned while submitting report"),
    };

    let report_id = match submitted {
        Ok(report_id) => report_id,
        Err(AppError::Store(StoreError::UnknownOffice(_))) => {
            return office_not_found(office_id, now);
        }
        Err(err) => {
            error!(office_id, error = %err, "Report submission failed");
            return internal_error("report submission failure");
        }
    };
    info!(office_id, report_id = %report_id, level = %request.level, "Report accepted");

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::CREATED,
            body: SubmitReportResponse {
                report_id,
                office_id: office_id.to_string(),
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn office_not_found<T>(office_id: &str, now: u64) -> ApiResponse<T> {
    error_response(
        StatusCode::NOT_FOUND,
        ErrorCode::OfficeNotFound,
        &format!("Office '{office_id}' not found"),
        now,
    )
}

fn error_response<T>(
    status: StatusCode,
    error_code: ErrorCode,
    message: &str,
    now: u64,
) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: message.to_string(),
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn internal_error<T>(message: &str) -> ApiResponse<T> {
    error!(message = message, "Internal error while handling API request");
    let formatted = format_timestamp(now_millis()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_timestamp(millis: u64) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(TimestampError::Range)?;
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::TimeOfDay;
    use crate::report::{CrowdLevel, Office, Report, ReportSource};
    use crate::state::AggregationSettings;
    use crate::store::InMemoryReportStore;

    // 2026-01-11T12:30:00Z
    const NOW: u64 = 1_768_134_600_000;
    const MINUTE: u64 = 60_000;

    fn office(id: &str, city: &str, kind: OfficeKind, latitude: f64, longitude: f64) -> Office {
        Office {
            id: id.to_string(),
            name: format!("Office {id}"),
            kind,
            city: city.to_string(),
            latitude,
            longitude,
            address: None,
        }
    }

    fn shared_state() -> SharedState {
        let mut store = InMemoryReportStore::new(vec![
            office("psk-andheri", "mumbai", OfficeKind::Passport, 19.1136, 72.8697),
            office("aadhaar-bandra", "mumbai", OfficeKind::Aadhaar, 19.0596, 72.8295),
            office("po-cp", "delhi", OfficeKind::Passport, 28.6304, 77.2177),
        ]);
        store.insert(Report::new(
            "seed-1",
            "psk-andheri",
            CrowdLevel::High,
            NOW - 5 * MINUTE,
            ReportSource::Seed,
        ));
        store.insert(Report::new(
            "seed-2",
            "psk-andheri",
            CrowdLevel::Low,
            NOW - 90 * MINUTE,
            ReportSource::Seed,
        ));
        Arc::new(RwLock::new(AppState::new(
            Box::new(store),
            AggregationSettings::default(),
        )))
    }

    fn expect_success<T>(response: ApiResponse<T>) -> (StatusCode, T) {
        match response {
            ApiResponse::Success { status, body } => (status, body),
            ApiResponse::Error { status, body } => {
                panic!("expected success, got {status}: {}", body.error_message)
            }
        }
    }

    fn expect_error<T>(response: ApiResponse<T>) -> (StatusCode, ErrorCode) {
        match response {
            ApiResponse::Success { status, .. } => panic!("expected error, got {status}"),
            ApiResponse::Error { status, body } => (status, body.error_code),
        }
    }

    #[test]
    fn health_reports_office_count() {
        let (status, body) = expect_success(build_health_response(shared_state(), NOW));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, HealthStatus::Ok);
        assert_eq!(body.office_count, 3);
        assert_eq!(body.timestamp, "2026-01-11T12:30:00Z");
    }

    #[test]
    fn offices_require_city() {
        let query = OfficesQuery {
            city: Some("  ".to_string()),
            kind: None,
        };

        let (status, code) = expect_error(build_offices_response(shared_state(), query, NOW));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn offices_filter_by_city_and_type() {
        let query = OfficesQuery {
            city: Some("Mumbai".to_string()),
            kind: Some(OfficeKind::Aadhaar),
        };

        let (_, body) = expect_success(build_offices_response(shared_state(), query, NOW));

        assert_eq!(body.offices.len(), 1);
        assert_eq!(body.offices[0].id, "aadhaar-bandra");
    }

    #[test]
    fn nearby_returns_sorted_offices_within_default_radius() {
        let query = NearbyQuery {
            lat: 19.1136,
            lon: 72.8697,
            radius_km: None,
        };

        let (_, body) = expect_success(build_nearby_response(shared_state(), query, NOW));

        let ids: Vec<&str> = body.offices.iter().map(|o| o.entity.id.as_str()).collect();
        assert_eq!(ids, ["psk-andheri", "aadhaar-bandra"]);
        assert_eq!(body.offices[0].distance_km, 0.0);
        assert_eq!(body.radius_km, 10.0);
    }

    #[test]
    fn nearby_rejects_out_of_range_coordinates() {
        let query = NearbyQuery {
            lat: 120.0,
            lon: 0.0,
            radius_km: None,
        };

        let (status, _) = expect_error(build_nearby_response(shared_state(), query, NOW));

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn crowd_aggregates_windowed_reports() {
        let (status, body) = expect_success(build_crowd_response(
            shared_state(),
            "psk-andheri",
            CrowdQuery::default(),
            NOW,
        ));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.level, CrowdLevel::High);
        assert_eq!(body.average_wait_minutes, 60);
        assert_eq!(body.total_report_count, 1);
        assert_eq!(body.last_updated_at.as_deref(), Some("2026-01-11T12:25:00Z"));
        assert_eq!(body.last_updated_label.as_deref(), Some("5 minutes ago"));
        assert_eq!(body.data_source, "seed");
        assert!(body.low_confidence);
    }

    #[test]
    fn crowd_honors_window_override() {
        let query = CrowdQuery {
            window_minutes: Some(120),
        };

        let (_, body) =
            expect_success(build_crowd_response(shared_state(), "psk-andheri", query, NOW));

        assert_eq!(body.total_report_count, 2);
        assert_eq!(body.window_minutes, 120);
        // tie between one high and one low seed vote
        assert_eq!(body.level, CrowdLevel::High);
        assert_eq!(body.average_wait_minutes, 35);
    }

    #[test]
    fn crowd_for_office_without_reports_uses_defaults() {
        let (_, body) = expect_success(build_crowd_response(
            shared_state(),
            "po-cp",
            CrowdQuery::default(),
            NOW,
        ));

        assert_eq!(body.level, CrowdLevel::Medium);
        assert_eq!(body.average_wait_minutes, 30);
        assert_eq!(body.last_updated_at, None);
        assert_eq!(body.last_updated_label, None);
    }

    #[test]
    fn crowd_rejects_zero_window() {
        let query = CrowdQuery {
            window_minutes: Some(0),
        };

        let (status, _) = expect_error(build_crowd_response(shared_state(), "po-cp", query, NOW));

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn crowd_unknown_office_is_not_found() {
        let (status, code) = expect_error(build_crowd_response(
            shared_state(),
            "nowhere",
            CrowdQuery::default(),
            NOW,
        ));

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::OfficeNotFound);
    }

    #[test]
    fn submitted_user_report_overrides_seed_data() {
        let state = shared_state();
        let request = SubmitReportRequest {
            level: CrowdLevel::Low,
            submitter_id: Some(" citizen-7 ".to_string()),
        };

        let (status, body) = expect_success(build_submit_report_response(
            Arc::clone(&state),
            "psk-andheri",
            request,
            NOW,
        ));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.report_id, "r-1");

        let (_, crowd) = expect_success(build_crowd_response(
            state,
            "psk-andheri",
            CrowdQuery::default(),
            NOW,
        ));
        assert_eq!(crowd.level, CrowdLevel::Low);
        assert_eq!(crowd.average_wait_minutes, 10);
        assert_eq!(crowd.total_report_count, 2);
        assert_eq!(crowd.user_report_count, 1);
        assert_eq!(crowd.data_source, "user");
        assert_eq!(crowd.last_updated_label.as_deref(), Some("Just now"));
    }

    #[test]
    fn submit_to_unknown_office_is_not_found() {
        let request = SubmitReportRequest {
            level: CrowdLevel::High,
            submitter_id: None,
        };

        let (status, _) = expect_error(build_submit_report_response(
            shared_state(),
            "nowhere",
            request,
            NOW,
        ));

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn advisory_context_contains_aggregate_only() {
        let (_, body) = expect_success(build_advisory_context_response(
            shared_state(),
            "psk-andheri",
            NOW,
        ));

        assert_eq!(body.office_id, "psk-andheri");
        assert_eq!(body.context.level, CrowdLevel::High);
        assert_eq!(body.context.last_updated_minutes, Some(5));
        assert_eq!(body.context.city, "mumbai");
        assert!(body.context.low_confidence);
        assert_eq!(body.context.time_of_day, Some(TimeOfDay::Afternoon));
        assert_eq!(body.context.day_of_week.as_deref(), Some("Sunday"));
    }

    #[test]
    fn format_timestamp_uses_rfc3339() {
        assert_eq!(
            format_timestamp(0).expect("format epoch"),
            "1970-01-01T00:00:00Z"
        );
    }
}
