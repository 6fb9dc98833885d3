//! Report store adapter.
//!
//! The aggregation engine never talks to storage. Callers fetch candidate
//! reports through a [`ReportStore`] and pass the resulting slice in.

use crate::report::{CrowdLevel, Office, OfficeKind, Report, ReportId, ReportSource};
use serde::Deserialize;
use std::cmp::Reverse;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_FETCH_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read seed file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown office: {0}")]
    UnknownOffice(String),
    #[error("duplicate office id in seed: {0}")]
    DuplicateOffice(String),
}

/// Fetch/submit capability for offices and their crowd reports.
pub trait ReportStore: Send + Sync + fmt::Debug {
    fn offices(&self) -> Vec<Office>;

    /// Offices in `city` (case-insensitive), optionally narrowed to one kind.
    fn offices_by_city(&self, city: &str, kind: Option<OfficeKind>) -> Vec<Office>;

    fn office(&self, office_id: &str) -> Option<Office>;

    /// Up to `limit` reports for the office, newest first.
    fn recent_reports(&self, office_id: &str, limit: usize) -> Result<Vec<Report>, StoreError>;

    /// Record a live user report and return its id.
    fn submit_report(
        &mut self,
        office_id: &str,
        level: CrowdLevel,
        submitter_id: Option<String>,
        now: u64,
    ) -> Result<ReportId, StoreError>;
}

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub offices: Vec<Office>,
    #[serde(default)]
    pub reports: Vec<SeedReport>,
}

/// Seed report positioned relative to load time.
#[derive(Debug, Deserialize)]
pub struct SeedReport {
    pub office_id: String,
    pub level: CrowdLevel,
    pub minutes_ago: u64,
    #[serde(default = "seed_source")]
    pub source: ReportSource,
}

fn seed_source() -> ReportSource {
    ReportSource::Seed
}

#[derive(Debug)]
pub struct InMemoryReportStore {
    offices: Vec<Office>,
    reports: Vec<Report>,
    next_report_id: u64,
}

impl InMemoryReportStore {
    pub fn new(offices: Vec<Office>) -> Self {
        Self {
            offices,
            reports: Vec::new(),
            next_report_id: 1,
        }
    }

    pub fn from_seed(seed: SeedFile, now: u64) -> Result<Self, StoreError> {
        let mut seen = std::collections::HashSet::new();
        for office in &seed.offices {
            if !seen.insert(office.id.as_str()) {
                return Err(StoreError::DuplicateOffice(office.id.clone()));
            }
        }

        let mut store = Self::new(seed.offices);
        for (index, entry) in seed.reports.into_iter().enumerate() {
            if store.office(&entry.office_id).is_none() {
                return Err(StoreError::UnknownOffice(entry.office_id));
            }
            store.insert(Report::new(
                format!("seed-{}", index + 1),
                entry.office_id,
                entry.level,
                now.saturating_sub(entry.minutes_ago.saturating_mul(60_000)),
                entry.source,
            ));
        }

        info!(
            offices = store.offices.len(),
            reports = store.reports.len(),
            "Report store seeded"
        );
        Ok(store)
    }

    pub fn load_seed_from_path(path: impl AsRef<Path>, now: u64) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let seed: SeedFile = serde_json::from_str(&contents)?;
        Self::from_seed(seed, now)
    }

    /// Add a report as-is, bypassing id assignment.
    pub fn insert(&mut self, report: Report) {
        self.reports.push(report);
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }
}

impl ReportStore for InMemoryReportStore {
    fn offices(&self) -> Vec<Office> {
        self.offices.clone()
    }

    fn offices_by_city(&self, city: &str, kind: Option<OfficeKind>) -> Vec<Office> {
        let city = city.trim().to_lowercase();
        let offices: Vec<Office> = self
            .offices
            .iter()
            .filter(|office| office.city.to_lowercase() == city)
            .filter(|office| kind.is_none_or(|kind| office.kind == kind))
            .cloned()
            .collect();
        debug!(
            city = %city,
            kind = kind.map_or("any", OfficeKind::as_str),
            found = offices.len(),
            "Offices queried"
        );
        offices
    }

    fn office(&self, office_id: &str) -> Option<Office> {
        self.offices.iter().find(|office| office.id == office_id).cloned()
    }

    fn recent_reports(&self, office_id: &str, limit: usize) -> Result<Vec<Report>, StoreError> {
        if self.office(office_id).is_none() {
            return Err(StoreError::UnknownOffice(office_id.to_string()));
        }

        let mut reports: Vec<Report> = self
            .reports
            .iter()
            .filter(|report| report.office_id == office_id)
            .cloned()
            .collect();
        // Unknown timestamps are read as "now", so they sort as newest.
        reports.sort_by_key(|report| Reverse(report.timestamp.unwrap_or(u64::MAX)));
        reports.truncate(limit);
        Ok(reports)
    }

    fn submit_report(
        &mut self,
        office_id: &str,
        level: CrowdLevel,
        submitter_id: Option<String>,
        now: u64,
    ) -> Result<ReportId, StoreError> {
        if self.office(office_id).is_none() {
            return Err(StoreError::UnknownOffice(office_id.to_string()));
        }

        let id = format!("r-{}", self.next_report_id);
        self.next_report_id += 1;
        let report = Report {
            id: id.clone(),
            office_id: office_id.to_string(),
            level,
            timestamp: Some(now),
            submitter_id,
            source: ReportSource::User,
        };
        info!(
            report_id = %id,
            office_id,
            %level,
            anonymous = report.is_anonymous(),
            "Crowd report recorded"
        );
        self.reports.push(report);
        Ok(id)
    }
}
