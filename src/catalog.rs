//! The catalog ties a repository to the active filter and sort and
//! publishes the resulting table view.
//!
//! Every change (a refresh, new filter criteria, a sort click) recomputes the
//! view from the current snapshot and sends it on a watch channel, so
//! renderers only ever see complete views.

use crate::models::ListingRecord;
use crate::query::{self, Facets, FilterCriteria, SortCriteria, SortKey};
use crate::repository::{ListingRepository, LoadReport, LoadStatus, RefreshOutcome, RepositoryState};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Everything a renderer needs for one frame of the listing table
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub status: LoadStatus,
    pub error: Option<String>,
    pub filter: FilterCriteria,
    pub sort: SortCriteria,
    /// Size of the unfiltered collection
    pub total: usize,
    pub rows: Vec<ListingRecord>,
    /// Option lists for the filter controls; unaffected by `filter`
    pub facets: Facets,
    pub report: Option<LoadReport>,
}

impl CatalogView {
    fn build(state: &RepositoryState, criteria: &Criteria) -> Self {
        let snapshot = &state.snapshot;
        let matched = query::filter(snapshot.records(), &criteria.filter);
        let rows = query::sort(matched, &criteria.sort)
            .into_iter()
            .cloned()
            .collect();

        Self {
            status: state.status,
            error: state.error.clone(),
            filter: criteria.filter.clone(),
            sort: criteria.sort,
            total: snapshot.len(),
            rows,
            facets: snapshot.facets().clone(),
            report: snapshot.report().cloned(),
        }
    }
}

#[derive(Debug, Default)]
struct Criteria {
    filter: FilterCriteria,
    sort: SortCriteria,
}

pub struct Catalog {
    repository: ListingRepository,
    criteria: Mutex<Criteria>,
    view: watch::Sender<Arc<CatalogView>>,
}

impl Catalog {
    pub fn new(repository: ListingRepository) -> Self {
        let criteria = Criteria::default();
        let initial = CatalogView::build(&repository.state(), &criteria);
        let (view, _) = watch::channel(Arc::new(initial));

        Self {
            repository,
            criteria: Mutex::new(criteria),
            view,
        }
    }

    pub fn repository(&self) -> &ListingRepository {
        &self.repository
    }

    /// Latest published view
    pub fn view(&self) -> Arc<CatalogView> {
        self.view.borrow().clone()
    }

    /// Receive every view published from now on
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogView>> {
        self.view.subscribe()
    }

    pub fn filter_criteria(&self) -> FilterCriteria {
        self.criteria().filter.clone()
    }

    pub fn sort_criteria(&self) -> SortCriteria {
        self.criteria().sort
    }

    /// Refresh the repository, publishing a `Loading` view first and the
    /// settled view after. A skipped refresh publishes nothing.
    pub async fn refresh(&self) -> RefreshOutcome {
        let guard = match self.repository.begin_refresh() {
            Some(guard) => guard,
            None => return RefreshOutcome::Skipped,
        };
        self.publish(self.criteria());

        let outcome = self.repository.finish_refresh(guard).await;
        self.publish(self.criteria());
        outcome
    }

    /// Replace the filter criteria wholesale.
    pub fn set_filter(&self, filter: FilterCriteria) {
        let mut criteria = self.criteria();
        criteria.filter = filter;
        self.publish(criteria);
    }

    /// Sort-column click: same key flips direction, a new key sorts ascending.
    pub fn set_sort_key(&self, key: SortKey) -> SortCriteria {
        let mut criteria = self.criteria();
        criteria.sort = criteria.sort.select(key);
        let sort = criteria.sort;
        self.publish(criteria);
        sort
    }

    pub fn set_sort(&self, sort: SortCriteria) {
        let mut criteria = self.criteria();
        criteria.sort = sort;
        self.publish(criteria);
    }

    fn criteria(&self) -> MutexGuard<'_, Criteria> {
        self.criteria.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Holding the criteria lock while publishing keeps views in change order
    fn publish(&self, criteria: MutexGuard<'_, Criteria>) {
        let view = CatalogView::build(&self.repository.state(), &criteria);
        debug!(
            "Publishing view: {} of {} listings, sorted by {} {:?}",
            view.rows.len(),
            view.total,
            view.sort.key,
            view.sort.order
        );
        self.view.send_replace(Arc::new(view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use crate::sources::SnapshotSource;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedSource(&'static str);

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    const LISTINGS: &str = r#"{
        "A": [
            {"unit": "101", "building": "A", "floorplan_type": "Studio", "available_date": "2024-03-01",
             "prices": [{"price": "1500", "date_fetched": "2024-02-01 08:00:00"}]},
            {"unit": "102", "building": "A", "floorplan_type": "1b1b", "available_date": "2024-07-15",
             "prices": [{"price": 900, "date_fetched": "2024-02-01 08:00:00"}]}
        ],
        "B": [
            {"unit": "201", "building": "B", "floorplan_type": "2b2b", "available_date": "1970-01-01",
             "prices": [{"price": "3,100", "date_fetched": "2024-02-01 08:00:00"}]}
        ]
    }"#;

    async fn loaded() -> Catalog {
        let catalog = Catalog::new(ListingRepository::new(Arc::new(FixedSource(LISTINGS))));
        catalog.refresh().await;
        catalog
    }

    fn units(view: &CatalogView) -> Vec<&str> {
        view.rows.iter().map(|r| r.unit.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initial_view_is_idle_and_empty() {
        let catalog = Catalog::new(ListingRepository::new(Arc::new(FixedSource("[]"))));
        let view = catalog.view();
        assert_eq!(view.status, LoadStatus::Idle);
        assert!(view.rows.is_empty());
        assert_eq!(view.sort, SortCriteria::default());
    }

    #[tokio::test]
    async fn test_refresh_publishes_default_sorted_view() {
        let catalog = loaded().await;
        let view = catalog.view();
        assert_eq!(view.status, LoadStatus::Loaded);
        assert_eq!(view.total, 3);
        assert_eq!(units(&view), vec!["101", "102", "201"]);
    }

    #[tokio::test]
    async fn test_filter_then_sort() {
        let catalog = loaded().await;
        catalog.set_filter(FilterCriteria {
            buildings: ["A".to_string()].into_iter().collect(),
            ..Default::default()
        });
        catalog.set_sort_key(SortKey::Price);

        let view = catalog.view();
        assert_eq!(units(&view), vec!["102", "101"]);
        assert_eq!(view.total, 3);
    }

    #[tokio::test]
    async fn test_facets_ignore_filters() {
        let catalog = loaded().await;
        catalog.set_filter(FilterCriteria {
            search: "studio".to_string(),
            ..Default::default()
        });

        let view = catalog.view();
        assert_eq!(units(&view), vec!["101"]);
        assert_eq!(view.facets.buildings, vec!["A", "B"]);
        assert_eq!(view.facets.floorplan_types, vec!["1b1b", "2b2b", "Studio"]);
    }

    #[tokio::test]
    async fn test_sort_key_toggle() {
        let catalog = loaded().await;

        let sort = catalog.set_sort_key(SortKey::Unit);
        assert_eq!(sort.order, SortOrder::Descending);
        assert_eq!(units(&catalog.view()), vec!["201", "102", "101"]);

        let sort = catalog.set_sort_key(SortKey::Price);
        assert_eq!(sort, SortCriteria::new(SortKey::Price, SortOrder::Ascending));

        let sort = catalog.set_sort_key(SortKey::Price);
        assert_eq!(sort.order, SortOrder::Descending);
        assert_eq!(catalog.sort_criteria(), sort);
        assert_eq!(units(&catalog.view()), vec!["201", "101", "102"]);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_change() {
        let catalog = loaded().await;
        let mut views = catalog.subscribe();
        assert!(!views.has_changed().unwrap());

        catalog.set_filter(FilterCriteria {
            max_price: Some(1000.0),
            ..Default::default()
        });
        assert!(views.has_changed().unwrap());
        assert_eq!(units(&views.borrow_and_update()), vec!["102"]);

        catalog.refresh().await;
        assert!(views.has_changed().unwrap());
        let view = views.borrow_and_update().clone();
        assert_eq!(units(&view), vec!["102"]);
        assert_eq!(view.filter.max_price, Some(1000.0));
        assert_eq!(catalog.filter_criteria(), view.filter);
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_view() {
        struct GatedSource(Arc<tokio::sync::Notify>);

        #[async_trait]
        impl SnapshotSource for GatedSource {
            async fn fetch(&self) -> Result<Vec<u8>> {
                self.0.notified().await;
                Ok(LISTINGS.as_bytes().to_vec())
            }

            fn describe(&self) -> String {
                "gated".to_string()
            }
        }

        let gate = Arc::new(tokio::sync::Notify::new());
        let source = GatedSource(gate.clone());
        let catalog = Arc::new(Catalog::new(ListingRepository::new(Arc::new(source))));
        let mut views = catalog.subscribe();

        let pending = tokio::spawn({
            let catalog = catalog.clone();
            async move { catalog.refresh().await }
        });
        views
            .wait_for(|view| view.status == LoadStatus::Loading)
            .await
            .unwrap();
        assert!(catalog.view().rows.is_empty());

        gate.notify_one();
        assert_eq!(pending.await.unwrap(), RefreshOutcome::Loaded { records: 3 });
        let view = catalog.view();
        assert_eq!(view.status, LoadStatus::Loaded);
        assert_eq!(view.total, 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_publishes_error_with_old_rows() {
        struct Broken;

        #[async_trait]
        impl SnapshotSource for Broken {
            async fn fetch(&self) -> Result<Vec<u8>> {
                anyhow::bail!("snapshot missing")
            }

            fn describe(&self) -> String {
                "broken".to_string()
            }
        }

        let catalog = Catalog::new(ListingRepository::new(Arc::new(Broken)));
        assert!(matches!(catalog.refresh().await, RefreshOutcome::Failed(_)));

        let view = catalog.view();
        assert_eq!(view.status, LoadStatus::Error);
        assert_eq!(view.error.as_deref(), Some("snapshot missing"));
        assert!(view.rows.is_empty());
    }
}
