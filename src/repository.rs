//! Listing repository: owns the loaded record collection and its lifecycle.
//!
//! `Idle -> Loading -> {Loaded, Error}`; a refresh from `Loaded` or `Error`
//! re-enters `Loading`. The collection lives behind an `Arc` that is swapped
//! on success, so anyone still holding the previous snapshot keeps a
//! consistent view of it.

use crate::config::PriceOrderPolicy;
use crate::error::CatalogError;
use crate::models::{ListingRecord, SnapshotDocument};
use crate::query::{is_newest_first, Facets};
use crate::sources::SnapshotSource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Offending units listed in a strict price-order failure
const MAX_LISTED_UNITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// What a successful refresh loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub records: usize,
    /// Number of groups when the snapshot was grouped by building
    pub groups: Option<usize>,
    /// `building/unit` labels whose prices are not newest-first
    pub price_order_violations: Vec<String>,
}

/// One immutable record collection with its facet lists
#[derive(Debug, Default)]
pub struct Snapshot {
    records: Vec<ListingRecord>,
    facets: Facets,
    report: Option<LoadReport>,
}

impl Snapshot {
    pub fn new(records: Vec<ListingRecord>, report: Option<LoadReport>) -> Self {
        let facets = Facets::from_records(&records);
        Self {
            records,
            facets,
            report,
        }
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for a unit id; unit ids are only unique within a building.
    pub fn find(&self, unit: &str, building: Option<&str>) -> Vec<&ListingRecord> {
        self.records
            .iter()
            .filter(|record| record.unit == unit)
            .filter(|record| building.map_or(true, |b| record.building == b))
            .collect()
    }
}

/// Observable repository state
#[derive(Debug, Clone)]
pub struct RepositoryState {
    pub status: LoadStatus,
    pub error: Option<String>,
    pub snapshot: Arc<Snapshot>,
}

impl Default for RepositoryState {
    fn default() -> Self {
        Self {
            status: LoadStatus::Idle,
            error: None,
            snapshot: Arc::new(Snapshot::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Loaded { records: usize },
    Failed(String),
    /// Another refresh was already running
    Skipped,
}

pub struct ListingRepository {
    source: Arc<dyn SnapshotSource>,
    price_order: PriceOrderPolicy,
    state: watch::Sender<RepositoryState>,
    in_flight: AtomicBool,
}

/// Claim on the single in-flight refresh.
///
/// Dropping it before the refresh settles (the caller's future was
/// cancelled) puts the status back to what it was before `Loading`.
pub struct RefreshGuard<'a> {
    repository: &'a ListingRepository,
    previous: LoadStatus,
    settled: bool,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Refresh abandoned, restoring {:?} status", self.previous);
            let previous = self.previous;
            self.repository.state.send_if_modified(|state| {
                if state.status == LoadStatus::Loading {
                    state.status = previous;
                    true
                } else {
                    false
                }
            });
        }
        self.repository.in_flight.store(false, Ordering::Release);
    }
}

impl ListingRepository {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        let (state, _) = watch::channel(RepositoryState::default());
        Self {
            source,
            price_order: PriceOrderPolicy::default(),
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_price_order(mut self, policy: PriceOrderPolicy) -> Self {
        self.price_order = policy;
        self
    }

    pub fn state(&self) -> RepositoryState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> LoadStatus {
        self.state.borrow().status
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.borrow().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RepositoryState> {
        self.state.subscribe()
    }

    /// Reload the collection from the source.
    ///
    /// On failure the previous collection stays in place and the error
    /// message is recorded. A call made while another refresh is running
    /// returns [`RefreshOutcome::Skipped`] without touching any state.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.begin_refresh() {
            Some(guard) => self.finish_refresh(guard).await,
            None => RefreshOutcome::Skipped,
        }
    }

    /// Enter `Loading`, or `None` when another refresh holds the claim.
    pub fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Refresh already in flight, skipping");
            return None;
        }

        let mut previous = LoadStatus::Idle;
        self.state.send_modify(|state| {
            previous = state.status;
            state.status = LoadStatus::Loading;
        });
        Some(RefreshGuard {
            repository: self,
            previous,
            settled: false,
        })
    }

    /// Load from the source and settle the state begun by [`Self::begin_refresh`].
    pub async fn finish_refresh(&self, mut guard: RefreshGuard<'_>) -> RefreshOutcome {
        info!("Refreshing listings from {}", self.source.describe());

        let outcome = match self.load().await {
            Ok(snapshot) => {
                let records = snapshot.len();
                info!("✅ Loaded {} listings", records);
                self.state.send_modify(|state| {
                    state.status = LoadStatus::Loaded;
                    state.error = None;
                    state.snapshot = Arc::new(snapshot);
                });
                RefreshOutcome::Loaded { records }
            }
            Err(err) => {
                let message = format!("{:#}", err);
                error!("Failed to refresh listings: {}", message);
                self.state.send_modify(|state| {
                    state.status = LoadStatus::Error;
                    state.error = Some(message.clone());
                });
                RefreshOutcome::Failed(message)
            }
        };
        guard.settled = true;
        outcome
    }

    async fn load(&self) -> Result<Snapshot> {
        let bytes = self.source.fetch().await?;
        let document = SnapshotDocument::from_slice(&bytes)?;
        let groups = document.group_count();
        let records = document.into_records();
        debug!("Parsed {} records ({:?} groups)", records.len(), groups);

        let price_order_violations = self.check_price_order(&records)?;

        let report = LoadReport {
            source: self.source.describe(),
            loaded_at: Utc::now(),
            records: records.len(),
            groups,
            price_order_violations,
        };
        Ok(Snapshot::new(records, Some(report)))
    }

    fn check_price_order(&self, records: &[ListingRecord]) -> Result<Vec<String>> {
        if self.price_order == PriceOrderPolicy::Ignore {
            return Ok(Vec::new());
        }

        let violations: Vec<String> = records
            .iter()
            .filter(|record| !is_newest_first(record))
            .map(|record| format!("{}/{}", record.building, record.unit))
            .collect();

        if violations.is_empty() {
            return Ok(violations);
        }

        let listed = violations
            .iter()
            .take(MAX_LISTED_UNITS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        match self.price_order {
            PriceOrderPolicy::Strict => Err(CatalogError::PriceOrder {
                count: violations.len(),
                units: listed,
            }
            .into()),
            _ => {
                warn!(
                    "{} listing(s) have prices that are not newest-first; current price may be stale: {}",
                    violations.len(),
                    listed
                );
                Ok(violations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Serves queued bodies in order; an `Err` entry simulates a transport failure
    struct QueuedSource {
        bodies: Mutex<Vec<Result<String, String>>>,
        gate: Option<Arc<Notify>>,
    }

    impl QueuedSource {
        fn new(bodies: Vec<Result<&str, &str>>) -> Self {
            Self {
                bodies: Mutex::new(
                    bodies
                        .into_iter()
                        .rev()
                        .map(|b| b.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                gate: None,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl SnapshotSource for QueuedSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.bodies.lock().unwrap().pop();
            match next {
                Some(Ok(body)) => Ok(body.into_bytes()),
                Some(Err(message)) => anyhow::bail!(message),
                None => anyhow::bail!("no more bodies"),
            }
        }

        fn describe(&self) -> String {
            "queued".to_string()
        }
    }

    const TWO_UNITS: &str = r#"[
        {"unit": "1A", "building": "haus25", "prices": [{"price": "2000", "date_fetched": "2024-02-01 08:00:00"}]},
        {"unit": "1B", "building": "haus25", "prices": []}
    ]"#;

    fn repository(bodies: Vec<Result<&str, &str>>) -> ListingRepository {
        ListingRepository::new(Arc::new(QueuedSource::new(bodies)))
    }

    #[tokio::test]
    async fn test_starts_idle_and_empty() {
        let repo = repository(vec![]);
        assert_eq!(repo.status(), LoadStatus::Idle);
        assert!(repo.snapshot().is_empty());
        assert!(repo.error().is_none());
    }

    #[tokio::test]
    async fn test_successful_refresh_replaces_collection() {
        let repo = repository(vec![Ok(TWO_UNITS), Ok(r#"[{"unit": "9Z"}]"#)]);

        assert_eq!(repo.refresh().await, RefreshOutcome::Loaded { records: 2 });
        assert_eq!(repo.status(), LoadStatus::Loaded);
        let first = repo.snapshot();

        assert_eq!(repo.refresh().await, RefreshOutcome::Loaded { records: 1 });
        assert_eq!(repo.snapshot().records()[0].unit, "9Z");

        // the earlier snapshot is untouched
        assert_eq!(first.len(), 2);
        let report = first.report().unwrap();
        assert_eq!(report.source, "queued");
        assert_eq!(report.groups, None);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_data() {
        let repo = repository(vec![Ok(TWO_UNITS), Err("connection reset"), Ok("not json")]);

        repo.refresh().await;
        let outcome = repo.refresh().await;
        assert_eq!(outcome, RefreshOutcome::Failed("connection reset".to_string()));
        assert_eq!(repo.status(), LoadStatus::Error);
        assert_eq!(repo.error().as_deref(), Some("connection reset"));
        assert_eq!(repo.snapshot().len(), 2);

        assert!(matches!(repo.refresh().await, RefreshOutcome::Failed(_)));
        assert_eq!(repo.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_error_clears_on_next_success() {
        let repo = repository(vec![Err("timeout"), Ok(TWO_UNITS)]);
        repo.refresh().await;
        assert_eq!(repo.status(), LoadStatus::Error);
        assert!(repo.snapshot().is_empty());

        repo.refresh().await;
        assert_eq!(repo.status(), LoadStatus::Loaded);
        assert!(repo.error().is_none());
    }

    #[tokio::test]
    async fn test_grouped_snapshot_is_flattened() {
        let repo = repository(vec![Ok(
            r#"{"haus25": [{"unit": "1"}, {"unit": "2"}], "1grove": [{"unit": "1"}]}"#,
        )]);
        assert_eq!(repo.refresh().await, RefreshOutcome::Loaded { records: 3 });
        assert_eq!(repo.snapshot().report().unwrap().groups, Some(2));
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let gate = Arc::new(Notify::new());
        let source = QueuedSource::new(vec![Ok(TWO_UNITS)]).gated(gate.clone());
        let repo = Arc::new(ListingRepository::new(Arc::new(source)));

        let mut states = repo.subscribe();
        let first = tokio::spawn({
            let repo = repo.clone();
            async move { repo.refresh().await }
        });

        states
            .wait_for(|state| state.status == LoadStatus::Loading)
            .await
            .unwrap();
        assert_eq!(repo.refresh().await, RefreshOutcome::Skipped);
        assert_eq!(repo.status(), LoadStatus::Loading);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), RefreshOutcome::Loaded { records: 2 });
        assert_eq!(repo.status(), LoadStatus::Loaded);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_restores_status() {
        let gate = Arc::new(Notify::new());
        let source = QueuedSource::new(vec![Ok(TWO_UNITS)]).gated(gate.clone());
        let repo = Arc::new(ListingRepository::new(Arc::new(source)));

        let mut states = repo.subscribe();
        let pending = tokio::spawn({
            let repo = repo.clone();
            async move { repo.refresh().await }
        });
        states
            .wait_for(|state| state.status == LoadStatus::Loading)
            .await
            .unwrap();

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(repo.status(), LoadStatus::Idle);

        gate.notify_one();
        assert_eq!(repo.refresh().await, RefreshOutcome::Loaded { records: 2 });
    }

    const OLDEST_FIRST: &str = r#"[
        {"unit": "2C", "building": "grove", "prices": [
            {"price": 1900, "date_fetched": "2024-01-01 08:00:00"},
            {"price": 2000, "date_fetched": "2024-02-01 08:00:00"}
        ]}
    ]"#;

    #[tokio::test]
    async fn test_price_order_warn_keeps_data() {
        let repo = repository(vec![Ok(OLDEST_FIRST)]);
        assert_eq!(repo.refresh().await, RefreshOutcome::Loaded { records: 1 });
        let snapshot = repo.snapshot();
        assert_eq!(
            snapshot.report().unwrap().price_order_violations,
            vec!["grove/2C".to_string()]
        );
    }

    #[tokio::test]
    async fn test_price_order_strict_fails_refresh() {
        let repo = repository(vec![Ok(TWO_UNITS), Ok(OLDEST_FIRST)])
            .with_price_order(PriceOrderPolicy::Strict);
        repo.refresh().await;

        match repo.refresh().await {
            RefreshOutcome::Failed(message) => assert!(message.contains("grove/2C")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(repo.status(), LoadStatus::Error);
        assert_eq!(repo.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_price_order_ignore() {
        let repo = repository(vec![Ok(OLDEST_FIRST)]).with_price_order(PriceOrderPolicy::Ignore);
        repo.refresh().await;
        assert!(repo.snapshot().report().unwrap().price_order_violations.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_unit_and_building() {
        let repo = repository(vec![Ok(
            r#"[{"unit": "1", "building": "a"}, {"unit": "1", "building": "b"}, {"unit": "2", "building": "a"}]"#,
        )]);
        repo.refresh().await;
        let snapshot = repo.snapshot();
        assert_eq!(snapshot.find("1", None).len(), 2);
        assert_eq!(snapshot.find("1", Some("b"))[0].building, "b");
        assert!(snapshot.find("3", None).is_empty());
    }
}
