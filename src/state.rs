use crate::aggregation::{AggregationResult, SourcePolicy, aggregate_with_policy};
use crate::config::Config;
use crate::error::AppError;
use crate::report::{CrowdLevel, OfficeId, ReportId};
use crate::store::{ReportStore, StoreError};
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSettings {
    pub window_minutes: u32,
    pub source_policy: SourcePolicy,
    pub report_fetch_limit: usize,
    pub default_radius_km: f64,
}

impl AggregationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_minutes: config.window_minutes(),
            source_policy: config.source_policy(),
            report_fetch_limit: config.report_fetch_limit(),
            default_radius_km: config.default_radius_km(),
        }
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            window_minutes: crate::aggregation::DEFAULT_WINDOW_MINUTES,
            source_policy: SourcePolicy::Override,
            report_fetch_limit: crate::store::DEFAULT_FETCH_LIMIT,
            default_radius_km: crate::geo::DEFAULT_RADIUS_KM,
        }
    }
}

/// Most recent aggregate recomputed after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeAggregate {
    pub office_id: OfficeId,
    pub result: AggregationResult,
}

#[derive(Debug)]
pub struct AppState {
    store: Box<dyn ReportStore>,
    settings: AggregationSettings,
    latest_aggregate: Option<OfficeAggregate>,
    latest_aggregate_tx: watch::Sender<Option<OfficeAggregate>>,
}

impl AppState {
    pub fn new(store: Box<dyn ReportStore>, settings: AggregationSettings) -> Self {
        let (latest_aggregate_tx, _latest_aggregate_rx) = watch::channel(None);
        Self {
            store,
            settings,
            latest_aggregate: None,
            latest_aggregate_tx,
        }
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    pub fn latest_aggregate(&self) -> Option<&OfficeAggregate> {
        self.latest_aggregate.as_ref()
    }

    pub fn subscribe_aggregates(&self) -> watch::Receiver<Option<OfficeAggregate>> {
        self.latest_aggregate_tx.subscribe()
    }

    /// Fetch the office's recent reports and aggregate them.
    ///
    /// Unknown offices are an error; any other fetch failure degrades to an
    /// empty report set so the caller still gets the neutral defaults.
    pub fn aggregate_office(
        &self,
        office_id: &str,
        window_minutes: u32,
        now: u64,
    ) -> Result<AggregationResult, AppError> {
        let reports = match self
            .store
            .recent_reports(office_id, self.settings.report_fetch_limit)
        {
            Ok(reports) => reports,
            Err(err @ StoreError::UnknownOffice(_)) => return Err(err.into()),
            Err(err) => {
                warn!(office_id, error = %err, "Report fetch failed, aggregating empty set");
                Vec::new()
            }
        };

        Ok(aggregate_with_policy(
            &reports,
            window_minutes,
            now,
            self.settings.source_policy,
        ))
    }

    /// Record a user report and publish the office's refreshed aggregate.
    pub fn submit_report(
        &mut self,
        office_id: &str,
        level: CrowdLevel,
        submitter_id: Option<String>,
        now: u64,
    ) -> Result<ReportId, AppError> {
        let report_id = self.store.submit_report(office_id, level, submitter_id, now)?;
        let result = self.aggregate_office(office_id, self.settings.window_minutes, now)?;
        self.set_latest_aggregate(OfficeAggregate {
            office_id: office_id.to_string(),
            result,
        });
        Ok(report_id)
    }

    // send_replace also succeeds while nobody is subscribed
    fn set_latest_aggregate(&mut self, aggregate: OfficeAggregate) {
        self.latest_aggregate = Some(aggregate.clone());
        self.latest_aggregate_tx.send_replace(Some(aggregate));
    }
}
