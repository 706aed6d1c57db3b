//! Meshview aggregation orchestrator.
//!
//! Runs fetch cycles across the active namespace set: config and validation
//! fetches fan out in parallel, configs are normalized/filtered/sorted and
//! published as a provisional list, then the validation tree is merged and
//! the final list published. Every in-flight batch carries the cycle id it
//! was started under; publish points drop results from superseded cycles.
//! Readers get the current list lock-free and can await publishes.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use meshview_api::{ConfigSource, ErrorReporter, SourceError};
use meshview_core::{
    ConfigItem, ConfigType, FilterState, Pagination, SortField, SortState, ValidationStatus,
    DEFAULT_PAGE_SIZE, PAGE_SIZES,
};
use meshview_list as list;
use meshview_list::ValidationTree;

/// Where the orchestrator currently is in its cycle state machine.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    ResolvingNamespaces,
    FetchingConfigs,
    AwaitingValidation,
    Failed,
}

/// Published list state: the post-filter, post-sort item list plus the view
/// metadata it was built under. The page window is derived on access.
#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot {
    pub cycle: u64,
    pub items: Vec<ConfigItem>,
    /// False while only the provisional (unvalidated) list is out.
    pub validated: bool,
    pub sort: SortState,
    pub pagination: Pagination,
}

impl ListSnapshot {
    pub fn page_items(&self) -> &[ConfigItem] {
        list::page_slice(&self.items, self.pagination.page, self.pagination.page_size)
    }
}

/// What re-selecting the already-active sort field does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortSelectBehavior {
    #[default]
    ToggleDirection,
    ResetAscending,
}

/// Initial view state for a controller.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filters: FilterState,
    pub sort: SortState,
    pub page_size: usize,
    pub sort_select: SortSelectBehavior,
}

impl ListOptions {
    /// Defaults with the environment knobs applied: `MESHVIEW_PAGE_SIZE`
    /// (must be one of the allowed sizes) and `MESHVIEW_SORT_SELECT`
    /// (`toggle` or `reset`).
    pub fn from_env() -> Self {
        let mut opts = Self { page_size: DEFAULT_PAGE_SIZE, ..Self::default() };
        if let Some(size) = std::env::var("MESHVIEW_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            if PAGE_SIZES.contains(&size) {
                opts.page_size = size;
            }
        }
        if let Ok(v) = std::env::var("MESHVIEW_SORT_SELECT") {
            opts.sort_select = match v.as_str() {
                "reset" => SortSelectBehavior::ResetAscending,
                _ => SortSelectBehavior::ToggleDirection,
            };
        }
        opts
    }
}

struct ViewState {
    filters: FilterState,
    sort: SortState,
    page: usize,
    page_size: usize,
    cycle: u64,
    publish_seq: u64,
    phase: CyclePhase,
    /// Current cycle's merged (pre-status-filter) items, kept so the status
    /// filter can be reapplied without a refetch.
    merged: Vec<ConfigItem>,
}

struct Shared {
    source: Arc<dyn ConfigSource>,
    reporter: Arc<dyn ErrorReporter>,
    sort_select: SortSelectBehavior,
    state: Mutex<ViewState>,
    snap: ArcSwap<ListSnapshot>,
    publish_tx: watch::Sender<u64>,
}

impl Shared {
    /// Swap the published snapshot. Caller holds the state lock, which is
    /// what serializes publishes and makes the cycle check race-free.
    fn publish_locked(&self, st: &mut ViewState, cycle: u64, items: Vec<ConfigItem>, validated: bool) {
        let snapshot = ListSnapshot {
            cycle,
            pagination: Pagination { page: st.page, page_size: st.page_size, total: items.len() },
            sort: st.sort,
            validated,
            items,
        };
        metrics::gauge!("list_published_items", snapshot.items.len() as f64);
        self.snap.store(Arc::new(snapshot));
        st.publish_seq += 1;
        let _ = self.publish_tx.send(st.publish_seq);
    }

    fn set_phase(&self, cycle: u64, phase: CyclePhase) {
        let mut st = self.state.lock().expect("state lock");
        if st.cycle == cycle {
            st.phase = phase;
        }
    }

    /// Mark the cycle failed and notify the error collaborator. Previously
    /// published state stays intact; stale-cycle failures are dropped.
    fn fail(&self, cycle: u64, stage: &'static str, message: &str, err: &SourceError) {
        {
            let mut st = self.state.lock().expect("state lock");
            if st.cycle != cycle {
                debug!(cycle, stage, "stale cycle failure ignored");
                return;
            }
            st.phase = CyclePhase::Failed;
        }
        metrics::counter!("list_cycle_failures_total", 1u64, "stage" => stage);
        warn!(cycle, stage, error = %err, "cycle failed");
        self.reporter.report(&format!("{message}: {err}"));
    }

    async fn run_cycle(self: Arc<Self>, cycle: u64, filters: FilterState) {
        let t0 = Instant::now();
        metrics::counter!("list_cycles_total", 1u64);
        info!(cycle, "cycle start");

        let namespaces: Vec<String> = if filters.namespaces.is_empty() {
            match self.source.fetch_namespaces().await {
                Ok(all) => all.into_iter().map(|n| n.name).collect(),
                Err(e) => {
                    return self.fail(cycle, "namespaces", "could not fetch the namespace list", &e)
                }
            }
        } else {
            filters.namespaces.iter().cloned().collect()
        };
        info!(cycle, namespaces = namespaces.len(), took_ms = %t0.elapsed().as_millis(), "cycle namespaces resolved");
        self.set_phase(cycle, CyclePhase::FetchingConfigs);

        // Validation fan-out starts alongside the config fetches; its join
        // point comes after the provisional publish.
        let validation_task = tokio::spawn({
            let source = Arc::clone(&self.source);
            let namespaces = namespaces.clone();
            async move {
                try_join_all(namespaces.into_iter().map(|ns| {
                    let source = Arc::clone(&source);
                    async move {
                        let v = source.fetch_validations(&ns).await?;
                        Ok::<_, SourceError>((ns, v))
                    }
                }))
                .await
            }
        });

        // Only the type filter is pushed down to the server; name and status
        // filters stay client-side.
        let type_filters: Vec<String> =
            filters.types.iter().map(|t| t.wire_id().to_string()).collect();
        let source = &self.source;
        let configs = try_join_all(namespaces.iter().map(|ns| {
            let type_filters = &type_filters;
            async move {
                let cfg = source.fetch_config(ns, type_filters).await?;
                Ok::<_, SourceError>((ns.clone(), cfg))
            }
        }))
        .await;

        // All-or-nothing: a partial list across a subset of namespaces is
        // never published.
        let configs = match configs {
            Ok(c) => c,
            Err(e) => {
                return self.fail(cycle, "configs", "could not fetch the config object list", &e)
            }
        };

        let mut items = Vec::new();
        for (ns, raw) in &configs {
            items.extend(list::normalize_namespace(ns, raw));
        }
        let items = list::filter_by_name(items, &filters.names);

        {
            let mut st = self.state.lock().expect("state lock");
            if st.cycle != cycle {
                info!(cycle, "cycle superseded before provisional publish");
                metrics::counter!("list_stale_results_total", 1u64, "stage" => "provisional");
                return;
            }
            let mut items = items;
            list::sort_items(&mut items, st.sort);
            st.merged = items.clone();
            st.page = 1;
            st.phase = CyclePhase::AwaitingValidation;
            self.publish_locked(&mut st, cycle, items, false);
        }
        info!(cycle, took_ms = %t0.elapsed().as_millis(), "provisional list published");

        let validations = match validation_task.await {
            Ok(res) => res,
            // Join errors only arise from a panic in the fan-out task.
            Err(e) => {
                let e = SourceError::Validations(e.to_string());
                return self.fail(cycle, "validations", "could not fetch the validation results", &e);
            }
        };
        let validations = match validations {
            Ok(v) => v,
            Err(e) => {
                // Non-fatal for the list: the provisional publish stays visible.
                return self.fail(cycle, "validations", "could not fetch the validation results", &e);
            }
        };

        let mut tree = ValidationTree::new();
        for (ns, v) in validations {
            tree.insert(ns, v);
        }

        {
            let mut st = self.state.lock().expect("state lock");
            if st.cycle != cycle {
                info!(cycle, "dropping late validation results from superseded cycle");
                metrics::counter!("list_stale_results_total", 1u64, "stage" => "validated");
                return;
            }
            let mut merged = std::mem::take(&mut st.merged);
            list::merge_validations(&mut merged, &tree);
            // Under a validation sort the ranks just changed; re-sorting is a
            // no-op for the other fields.
            list::sort_items(&mut merged, st.sort);
            st.merged = merged.clone();
            let final_items = list::filter_by_validation(merged, &st.filters.statuses);
            st.phase = CyclePhase::Idle;
            self.publish_locked(&mut st, cycle, final_items, true);
        }
        info!(cycle, took_ms = %t0.elapsed().as_millis(), "validated list published");
    }
}

/// Aggregated config list controller.
///
/// Owns the view state (filters, sort, pagination) and runs fetch cycles
/// against the configured source. Entry points that change what the server
/// returns start a new cycle; sort/page/status-filter changes rework the
/// already-published list in place. Must be used within a tokio runtime.
pub struct ListController {
    shared: Arc<Shared>,
    publish_rx: watch::Receiver<u64>,
}

impl ListController {
    /// Controller with the environment-derived defaults. Call `refresh` to
    /// run the first cycle.
    pub fn new(source: Arc<dyn ConfigSource>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self::with_options(source, reporter, ListOptions::from_env())
    }

    pub fn with_options(
        source: Arc<dyn ConfigSource>,
        reporter: Arc<dyn ErrorReporter>,
        options: ListOptions,
    ) -> Self {
        let page_size = if PAGE_SIZES.contains(&options.page_size) {
            options.page_size
        } else {
            DEFAULT_PAGE_SIZE
        };
        let (publish_tx, publish_rx) = watch::channel(0u64);
        let snap = ArcSwap::from_pointee(ListSnapshot {
            cycle: 0,
            items: Vec::new(),
            validated: false,
            sort: options.sort,
            pagination: Pagination { page: 1, page_size, total: 0 },
        });
        let shared = Arc::new(Shared {
            source,
            reporter,
            sort_select: options.sort_select,
            state: Mutex::new(ViewState {
                filters: options.filters,
                sort: options.sort,
                page: 1,
                page_size,
                cycle: 0,
                publish_seq: 0,
                phase: CyclePhase::Idle,
                merged: Vec::new(),
            }),
            snap,
            publish_tx,
        });
        Self { shared, publish_rx }
    }

    fn trigger(&self) {
        let (cycle, filters) = {
            let mut st = self.shared.state.lock().expect("state lock");
            st.cycle += 1;
            st.phase = CyclePhase::ResolvingNamespaces;
            (st.cycle, st.filters.clone())
        };
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.run_cycle(cycle, filters).await });
    }

    /// Re-run the current trigger: resolve namespaces, fetch, publish.
    pub fn refresh(&self) {
        self.trigger();
    }

    /// Current published state, lock-free.
    pub fn snapshot(&self) -> Arc<ListSnapshot> {
        self.shared.snap.load_full()
    }

    /// Current visible page window.
    pub fn page_items(&self) -> Vec<ConfigItem> {
        self.snapshot().page_items().to_vec()
    }

    /// Receiver that changes on every publish; the value is a monotonically
    /// increasing publish sequence number.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.publish_rx.clone()
    }

    pub fn phase(&self) -> CyclePhase {
        self.shared.state.lock().expect("state lock").phase
    }

    pub fn sort_state(&self) -> SortState {
        self.shared.state.lock().expect("state lock").sort
    }

    pub fn filters(&self) -> FilterState {
        self.shared.state.lock().expect("state lock").filters.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.snapshot().pagination
    }

    pub fn page_size_options(&self) -> &'static [usize] {
        &PAGE_SIZES
    }

    pub fn set_page(&self, page: usize) {
        let mut st = self.shared.state.lock().expect("state lock");
        let cur = self.shared.snap.load_full();
        let pages = Pagination { page: 1, page_size: st.page_size, total: cur.items.len() }.page_count();
        st.page = page.clamp(1, pages.max(1));
        self.shared.publish_locked(&mut st, cur.cycle, cur.items.clone(), cur.validated);
    }

    /// Switch the page size; the page resets to 1. Sizes outside the allowed
    /// options are ignored.
    pub fn set_page_size(&self, size: usize) {
        if !PAGE_SIZES.contains(&size) {
            warn!(size, "ignoring page size outside the allowed options");
            return;
        }
        let mut st = self.shared.state.lock().expect("state lock");
        st.page_size = size;
        st.page = 1;
        let cur = self.shared.snap.load_full();
        self.shared.publish_locked(&mut st, cur.cycle, cur.items.clone(), cur.validated);
    }

    /// Select the sort field. Re-selecting the active field either toggles
    /// the direction or resets it to ascending, per the configured behavior.
    /// The published list is re-sorted in place, no refetch.
    pub fn set_sort_field(&self, field: SortField) {
        let mut st = self.shared.state.lock().expect("state lock");
        if st.sort.field == field {
            match self.shared.sort_select {
                SortSelectBehavior::ToggleDirection => st.sort.ascending = !st.sort.ascending,
                SortSelectBehavior::ResetAscending => st.sort.ascending = true,
            }
        } else {
            st.sort.field = field;
        }
        self.resort_locked(&mut st);
    }

    pub fn toggle_sort_direction(&self) {
        let mut st = self.shared.state.lock().expect("state lock");
        st.sort.ascending = !st.sort.ascending;
        self.resort_locked(&mut st);
    }

    fn resort_locked(&self, st: &mut ViewState) {
        list::sort_items(&mut st.merged, st.sort);
        let cur = self.shared.snap.load_full();
        let mut items = cur.items.clone();
        list::sort_items(&mut items, st.sort);
        self.shared.publish_locked(st, cur.cycle, items, cur.validated);
    }

    /// Restrict the namespace fan-out; empty means every namespace the
    /// source reports. Starts a new cycle.
    pub fn set_namespace_filter(&self, namespaces: impl IntoIterator<Item = String>) {
        {
            let mut st = self.shared.state.lock().expect("state lock");
            st.filters.namespaces = namespaces.into_iter().collect();
        }
        self.trigger();
    }

    /// Restrict the fetched categories; pushed down to the server. Starts a
    /// new cycle.
    pub fn set_type_filter(&self, types: impl IntoIterator<Item = ConfigType>) {
        {
            let mut st = self.shared.state.lock().expect("state lock");
            st.filters.types = types.into_iter().collect();
        }
        self.trigger();
    }

    /// Replace the name substrings. Starts a new cycle.
    pub fn set_name_filter(&self, names: impl IntoIterator<Item = String>) {
        {
            let mut st = self.shared.state.lock().expect("state lock");
            st.filters.names = names.into_iter().collect();
        }
        self.trigger();
    }

    /// Replace the status filter and reapply it against the current cycle's
    /// merged list, without a refetch.
    pub fn set_validation_filter(&self, statuses: impl IntoIterator<Item = ValidationStatus>) {
        let mut st = self.shared.state.lock().expect("state lock");
        st.filters.statuses = statuses.into_iter().collect();
        let cur = self.shared.snap.load_full();
        let items = list::filter_by_validation(st.merged.clone(), &st.filters.statuses);
        st.page = 1;
        self.shared.publish_locked(&mut st, cur.cycle, items, cur.validated);
    }
}
