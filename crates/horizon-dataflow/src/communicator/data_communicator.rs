//! The data communicator: keeps a client-side row cache in sync with a
//! data provider.
//!
//! # Synchronization passes
//!
//! State changes only mark the communicator dirty. The owner calls
//! [`DataCommunicator::before_client_response`] once per outgoing response,
//! which coalesces everything since the previous pass into at most three
//! commands, always in this order:
//!
//! 1. `reset(size)` on the first response or when a reset is pending
//! 2. `update_data` for refreshed rows the client currently has
//! 3. `set_data` for the row window the client asked for
//!
//! A pass is built completely before anything is written to the channel, so
//! a failing provider or generator leaves the client untouched.
//!
//! # Active rows
//!
//! Rows the client drops are swept lazily by the [`ActiveDataHandler`]; see
//! its module for the mark and sweep rules.

use std::sync::{Arc, Weak};

use horizon_dataflow_core::PerfSpan;
use horizon_dataflow_core::logging::{span_names, targets};
use parking_lot::{Mutex, RwLock};

use super::active_data::ActiveDataHandler;
use super::channel::{ClientChannel, ServerCommand};
use super::config::{CommunicatorBuilder, CommunicatorConfig};
use super::generator::{DataGenerator, RowRecord, fields};
use super::key_mapper::{DataKeyMapper, KeyMapper};
use super::range::Range;
use crate::error::{DataError, Result};
use crate::identity::{DataItem, IdentifierGetter};
use crate::provider::{
    AnyDataProvider, Comparator, DataChangeEvent, DataProvider, Listener, NO_LIMIT, Query,
    QuerySortOrder, Registration,
};

/// Bound for filter values a communicator stores and compares.
pub trait FilterValue: Clone + PartialEq + Send + Sync + 'static {}

impl<F> FilterValue for F where F: Clone + PartialEq + Send + Sync + 'static {}

/// Where the communicator gets its rows from.
///
/// Flat communicators read the provider directly; hierarchical ones read a
/// flattened tree.
pub(crate) trait RowSource<T: DataItem, F>: Send + Sync {
    /// The filter or sorting changed. `template` carries the new values and
    /// an unbounded window.
    fn configure(&self, _template: &Query<T, F>) {}

    /// Total number of rows.
    fn size(&self, template: &Query<T, F>) -> Result<usize>;

    /// The rows in the query's window.
    fn fetch(&self, query: &Query<T, F>) -> Result<Vec<T>>;
}

struct FlatRows<T: DataItem, F>(AnyDataProvider<T, F>);

impl<T: DataItem, F: FilterValue> RowSource<T, F> for FlatRows<T, F> {
    fn size(&self, template: &Query<T, F>) -> Result<usize> {
        self.0.size(template)
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<Vec<T>> {
        Ok(self.0.fetch(query)?.collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetKind {
    None,
    /// The client re-requests its window under the new size.
    Soft,
    /// Additionally, every active row is marked dropped.
    Hard,
}

struct CommunicatorState<T: DataItem, F> {
    config: CommunicatorConfig,
    provider: Option<AnyDataProvider<T, F>>,
    source: Option<Arc<dyn RowSource<T, F>>>,
    registration: Option<Registration<T>>,
    generation: u64,
    filter: Option<F>,
    in_memory_sorting: Option<Comparator<T>>,
    back_end_sorting: Vec<QuerySortOrder>,
    requested: Range,
    pending_refresh: Vec<T>,
    reset: ResetKind,
    dirty: bool,
    attached: bool,
    active: ActiveDataHandler<T>,
}

impl<T: DataItem, F: FilterValue> CommunicatorState<T, F> {
    fn query(&self, window: Range) -> Query<T, F> {
        Query::full(
            window.start(),
            window.length(),
            self.back_end_sorting.clone(),
            self.in_memory_sorting.clone(),
            self.filter.clone(),
        )
    }

    fn template(&self) -> Query<T, F> {
        self.query(Range::with_length(0, NO_LIMIT))
    }

    /// Requests a soft reset unless a hard one is already pending.
    fn soft_reset(&mut self) {
        if self.reset == ResetKind::None {
            self.reset = ResetKind::Soft;
        }
        self.dirty = true;
    }
}

/// Everything a pass reads, captured under the state lock.
struct PassPlan<T: DataItem, F> {
    source: Arc<dyn RowSource<T, F>>,
    template: Query<T, F>,
    window: Range,
    reset: bool,
    hard: bool,
    refreshed: Vec<T>,
}

/// Synchronizes a row window and per-row updates with one client.
///
/// Created behind an [`Arc`]; filter slots and provider listeners hold weak
/// references to it.
pub struct DataCommunicator<T: DataItem, F> {
    this: Weak<Self>,
    state: Mutex<CommunicatorState<T, F>>,
    generators: RwLock<Vec<Arc<dyn DataGenerator<T>>>>,
    key_mapper: Arc<dyn DataKeyMapper<T>>,
    channel: Arc<dyn ClientChannel>,
}

impl<T: DataItem, F: FilterValue> DataCommunicator<T, F> {
    /// Creates a communicator with default configuration pushing to `channel`.
    pub fn new(channel: Arc<dyn ClientChannel>) -> Arc<Self> {
        Self::with_parts(
            CommunicatorConfig::default(),
            Arc::new(KeyMapper::new()),
            channel,
        )
    }

    /// Returns a builder for custom configuration.
    pub fn builder() -> CommunicatorBuilder<T> {
        CommunicatorBuilder::new()
    }

    pub(crate) fn with_parts(
        config: CommunicatorConfig,
        key_mapper: Arc<dyn DataKeyMapper<T>>,
        channel: Arc<dyn ClientChannel>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: Mutex::new(CommunicatorState {
                config,
                provider: None,
                source: None,
                registration: None,
                generation: 0,
                filter: None,
                in_memory_sorting: None,
                back_end_sorting: Vec::new(),
                requested: Range::empty(),
                pending_refresh: Vec::new(),
                reset: ResetKind::None,
                dirty: false,
                attached: false,
                active: ActiveDataHandler::new(key_mapper.clone()),
            }),
            generators: RwLock::new(Vec::new()),
            key_mapper,
            channel,
        })
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// A copy of the current configuration.
    pub fn config(&self) -> CommunicatorConfig {
        self.state.lock().config.clone()
    }

    /// Rows sent in the first response, before the client asks for any.
    pub fn min_push_size(&self) -> usize {
        self.state.lock().config.min_push_size
    }

    pub fn set_min_push_size(&self, min_push_size: usize) {
        self.state.lock().config.min_push_size = min_push_size;
    }

    /// The key mapper correlating rows with client keys.
    pub fn key_mapper(&self) -> &Arc<dyn DataKeyMapper<T>> {
        &self.key_mapper
    }

    /// The client key of `item`, if the item has one.
    pub fn key_of(&self, item: &T) -> Option<String> {
        self.key_mapper
            .has(item)
            .then(|| self.key_mapper.key(item))
    }

    pub(crate) fn channel(&self) -> &Arc<dyn ClientChannel> {
        &self.channel
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to the current provider's change notifications.
    ///
    /// The next response should be passed `initial = true`.
    pub fn attach(&self) {
        {
            let mut state = self.state.lock();
            state.attached = true;
            state.dirty = true;
        }
        self.connect_listener();
    }

    /// Disconnects from the provider's change notifications.
    pub fn detach(&self) {
        let registration = {
            let mut state = self.state.lock();
            state.attached = false;
            state.registration.take()
        };
        drop(registration);
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// Schedules a pass on the next response.
    pub fn mark_as_dirty(&self) {
        self.state.lock().dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub(crate) fn is_reset_pending(&self) -> bool {
        self.state.lock().reset != ResetKind::None
    }

    // =========================================================================
    // Data provider
    // =========================================================================

    /// Installs `provider` with `initial_filter`.
    ///
    /// Everything known about the previous provider's rows is destroyed and a
    /// hard reset is scheduled whose first response carries the first
    /// `min_push_size` rows. The returned slot changes the filter until
    /// another provider is installed.
    pub fn set_data_provider(
        &self,
        provider: AnyDataProvider<T, F>,
        initial_filter: Option<F>,
    ) -> FilterSlot<T, F> {
        let source = Arc::new(FlatRows(provider.clone()));
        self.install(provider, initial_filter, source)
    }

    pub(crate) fn install(
        &self,
        provider: AnyDataProvider<T, F>,
        initial_filter: Option<F>,
        source: Arc<dyn RowSource<T, F>>,
    ) -> FilterSlot<T, F> {
        let previous = self.state.lock().registration.take();
        drop(previous);
        self.destroy_all_data();

        let id_getter: IdentifierGetter<T> = {
            let provider = provider.clone();
            Arc::new(move |item: &T| provider.id(item))
        };
        self.key_mapper.set_identifier_getter(id_getter.clone());

        let (generation, template) = {
            let mut state = self.state.lock();
            state.active.set_identifier_getter(id_getter);
            state.provider = Some(provider);
            state.source = Some(source.clone());
            state.filter = initial_filter;
            state.generation += 1;
            state.reset = ResetKind::Hard;
            state.requested = Range::with_length(0, state.config.min_push_size);
            state.dirty = true;
            (state.generation, state.template())
        };
        source.configure(&template);
        self.connect_listener();

        tracing::debug!(target: targets::COMMUNICATOR, generation, "data provider installed");
        FilterSlot {
            communicator: self.this.clone(),
            generation,
        }
    }

    /// The installed provider.
    pub fn data_provider(&self) -> Option<AnyDataProvider<T, F>> {
        self.state.lock().provider.clone()
    }

    fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    fn connect_listener(&self) {
        let provider = {
            let state = self.state.lock();
            if !state.attached || state.registration.is_some() {
                return;
            }
            match &state.provider {
                Some(provider) => provider.clone(),
                None => return,
            }
        };
        let registration = provider.add_data_provider_listener(self.listener());
        self.state.lock().registration = Some(registration);
    }

    fn listener(&self) -> Listener<T> {
        let this = self.this.clone();
        Arc::new(move |event: &DataChangeEvent<T>| {
            let Some(communicator) = this.upgrade() else {
                return;
            };
            match event {
                DataChangeEvent::RefreshAll => {
                    if let Err(err) = communicator.reset() {
                        tracing::warn!(target: targets::COMMUNICATOR, %err, "eager reset failed");
                    }
                }
                DataChangeEvent::RefreshItem(item) => communicator.refresh(item),
            }
        })
    }

    /// Total row count under the current filter.
    pub fn data_provider_size(&self) -> Result<usize> {
        let (source, template) = self.source_and_template()?;
        source.size(&template)
    }

    /// Fetches `limit` rows from `offset` with the current filter and sorting.
    pub fn fetch_items_with_range(&self, offset: usize, limit: usize) -> Result<Vec<T>> {
        let (source, template) = self.source_and_template()?;
        let _span = PerfSpan::new(span_names::FETCH);
        let query = Query::full(
            offset,
            limit,
            template.sort_orders().to_vec(),
            template.in_memory_sorting().cloned(),
            template.filter().cloned(),
        );
        source.fetch(&query)
    }

    fn source_and_template(&self) -> Result<(Arc<dyn RowSource<T, F>>, Query<T, F>)> {
        let state = self.state.lock();
        let source = state
            .source
            .clone()
            .ok_or_else(|| DataError::illegal_state("no data provider installed"))?;
        Ok((source, state.template()))
    }

    // =========================================================================
    // Filter and sorting
    // =========================================================================

    /// The current filter.
    pub fn filter(&self) -> Option<F> {
        self.state.lock().filter.clone()
    }

    pub(crate) fn set_filter(&self, filter: Option<F>) -> Result<()> {
        self.change_query(|state| {
            if state.filter == filter {
                return false;
            }
            state.filter = filter;
            true
        })
    }

    pub fn in_memory_sorting(&self) -> Option<Comparator<T>> {
        self.state.lock().in_memory_sorting.clone()
    }

    /// Sets the comparator used by in-memory providers.
    pub fn set_in_memory_sorting(&self, comparator: Option<Comparator<T>>) -> Result<()> {
        self.change_query(|state| {
            state.in_memory_sorting = comparator;
            true
        })
    }

    pub fn back_end_sorting(&self) -> Vec<QuerySortOrder> {
        self.state.lock().back_end_sorting.clone()
    }

    /// Sets the sort orders passed to back end providers.
    pub fn set_back_end_sorting(&self, sort_orders: Vec<QuerySortOrder>) -> Result<()> {
        self.change_query(|state| {
            state.back_end_sorting = sort_orders;
            true
        })
    }

    fn change_query(
        &self,
        change: impl FnOnce(&mut CommunicatorState<T, F>) -> bool,
    ) -> Result<()> {
        let (source, template, eager) = {
            let mut state = self.state.lock();
            if !change(&mut state) {
                return Ok(());
            }
            state.soft_reset();
            (state.source.clone(), state.template(), state.config.eager_reset)
        };
        if let Some(source) = source {
            source.configure(&template);
        }
        if eager {
            self.before_client_response(true)?;
        }
        Ok(())
    }

    // =========================================================================
    // Refresh and reset
    // =========================================================================

    /// Sends `item` again on the next pass if the client currently has it.
    ///
    /// Repeated refreshes of the same row between passes collapse into one
    /// update carrying the latest instance.
    pub fn refresh(&self, item: &T) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.active.is_active(item) {
            return;
        }
        let id = state.active.identity(item);
        let queued = state
            .pending_refresh
            .iter()
            .position(|pending| state.active.identity(pending) == id);
        match queued {
            Some(index) => state.pending_refresh[index] = item.clone(),
            None => state.pending_refresh.push(item.clone()),
        }
        state.dirty = true;
    }

    /// Lets the client re-request its window under a possibly new size.
    ///
    /// With `eager_reset` configured, a full response is produced right away.
    pub fn reset(&self) -> Result<()> {
        let eager = {
            let mut state = self.state.lock();
            if state.reset == ResetKind::Hard {
                return Ok(());
            }
            state.soft_reset();
            state.config.eager_reset
        };
        if eager {
            self.before_client_response(true)?;
        }
        Ok(())
    }

    // =========================================================================
    // Generators
    // =========================================================================

    /// Adds a generator. Adding the same generator twice has no effect.
    pub fn add_data_generator(&self, generator: Arc<dyn DataGenerator<T>>) {
        {
            let mut generators = self.generators.write();
            if generators.iter().any(|g| same_generator(g, &generator)) {
                return;
            }
            generators.push(generator);
        }
        self.state.lock().soft_reset();
    }

    /// Removes a generator and lets it release all of its data.
    pub fn remove_data_generator(&self, generator: &Arc<dyn DataGenerator<T>>) {
        let removed = {
            let mut generators = self.generators.write();
            let before = generators.len();
            generators.retain(|g| !same_generator(g, generator));
            generators.len() != before
        };
        if removed {
            generator.destroy_all_data();
        }
    }

    fn generators(&self) -> Vec<Arc<dyn DataGenerator<T>>> {
        self.generators.read().clone()
    }

    // =========================================================================
    // Client messages
    // =========================================================================

    /// Dispatches a message received from the client.
    pub fn handle_client_command(&self, command: ServerCommand) {
        match command {
            ServerCommand::RequestRows {
                first_row_index,
                number_of_rows,
                first_cached_row_index,
                cache_size,
            } => self.on_request_rows(
                first_row_index,
                number_of_rows,
                first_cached_row_index,
                cache_size,
            ),
            ServerCommand::DropRows { keys } => self.on_drop_rows(&keys),
        }
    }

    /// The client wants `number_of_rows` rows from `first_row_index`.
    pub fn on_request_rows(
        &self,
        first_row_index: usize,
        number_of_rows: usize,
        first_cached_row_index: usize,
        cache_size: usize,
    ) {
        tracing::trace!(
            target: targets::COMMUNICATOR,
            first_row_index,
            number_of_rows,
            first_cached_row_index,
            cache_size,
            "rows requested"
        );
        let mut state = self.state.lock();
        state.requested = Range::with_length(first_row_index, number_of_rows);
        state.dirty = true;
    }

    /// The client discarded the rows with `keys`.
    pub fn on_drop_rows(&self, keys: &[String]) {
        let mut state = self.state.lock();
        for key in keys {
            if !state.active.drop_active_data(key) {
                tracing::warn!(
                    target: targets::COMMUNICATOR,
                    key = %key,
                    "client dropped an unknown row"
                );
            }
        }
    }

    // =========================================================================
    // Active rows
    // =========================================================================

    /// Rows the client currently has, in no particular order.
    pub fn active_items(&self) -> Vec<T> {
        self.state.lock().active.active_items()
    }

    /// Number of rows marked dropped and not yet swept.
    pub fn dropped_count(&self) -> usize {
        self.state.lock().active.dropped_count()
    }

    /// The active row with client key `key`.
    pub fn item_for_key(&self, key: &str) -> Option<T> {
        self.state.lock().active.item_for_key(key)
    }

    fn destroy_data(&self, item: &T) {
        for generator in self.generators() {
            generator.destroy_data(item);
        }
        self.key_mapper.remove(item);
    }

    fn destroy_all_data(&self) {
        {
            let mut state = self.state.lock();
            state.active.destroy_all_data();
            state.pending_refresh.clear();
        }
        for generator in self.generators() {
            generator.destroy_all_data();
        }
        self.key_mapper.remove_all();
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Builds the outgoing record for `item`.
    fn record_for(&self, item: &T, generators: &[Arc<dyn DataGenerator<T>>]) -> Result<RowRecord> {
        let mut record = RowRecord::new();
        record.insert(fields::KEY.into(), self.key_mapper.key(item).into());
        for generator in generators {
            generator.generate_data(item, &mut record)?;
        }
        Ok(record)
    }

    pub(crate) fn build_records(&self, items: &[T]) -> Result<Vec<RowRecord>> {
        let generators = self.generators();
        items
            .iter()
            .map(|item| self.record_for(item, &generators))
            .collect()
    }

    /// Sends prepared rows and records them as active.
    pub(crate) fn send_rows(&self, first_index: usize, items: &[T], records: Vec<RowRecord>) {
        self.channel.set_data(first_index, records);
        let swept = {
            let mut state = self.state.lock();
            state.active.add_active_data(items);
            state.active.clean_up(items)
        };
        for item in &swept {
            self.destroy_data(item);
        }
    }

    /// Runs a synchronization pass.
    ///
    /// `initial` is `true` for the first response after attaching. Without a
    /// pending change and outside the first response this does nothing.
    #[tracing::instrument(skip_all, target = "horizon_dataflow::communicator", level = "trace")]
    pub fn before_client_response(&self, initial: bool) -> Result<()> {
        let _span = PerfSpan::new(span_names::SYNC_PASS);
        let Some(plan) = self.plan_pass(initial) else {
            return Ok(());
        };

        let size = if plan.reset {
            Some(plan.source.size(&plan.template)?)
        } else {
            None
        };

        let generators = self.generators();
        let mut updates = Vec::with_capacity(plan.refreshed.len());
        for item in &plan.refreshed {
            self.key_mapper.refresh(item);
            for generator in &generators {
                generator.refresh_data(item);
            }
            updates.push(self.record_for(item, &generators)?);
        }

        let rows = if plan.window.is_empty() {
            Vec::new()
        } else {
            let query = Query::full(
                plan.window.start(),
                plan.window.length(),
                plan.template.sort_orders().to_vec(),
                plan.template.in_memory_sorting().cloned(),
                plan.template.filter().cloned(),
            );
            plan.source.fetch(&query)?
        };
        let records = self.build_records(&rows)?;

        let escalate = !plan.reset && !plan.window.is_empty() && rows.is_empty();
        {
            let mut state = self.state.lock();
            if plan.hard {
                state.active.drop_all_active_data();
            }
            for item in &plan.refreshed {
                state.active.update_active(item);
            }
            let sent = plan.refreshed.len().min(state.pending_refresh.len());
            state.pending_refresh.drain(..sent);
            state.requested = Range::empty();
            state.reset = if escalate {
                ResetKind::Hard
            } else {
                ResetKind::None
            };
            state.dirty = escalate || !state.pending_refresh.is_empty();
        }

        if escalate {
            tracing::debug!(
                target: targets::COMMUNICATOR,
                window = %plan.window,
                "requested window is empty, resetting on next pass"
            );
        }
        tracing::trace!(
            target: targets::COMMUNICATOR,
            ?size,
            updated = updates.len(),
            rows = rows.len(),
            "sending pass"
        );

        if let Some(size) = size {
            self.channel.reset(size);
        }
        if !updates.is_empty() {
            self.channel.update_data(updates);
        }
        if !plan.window.is_empty() && !escalate {
            self.send_rows(plan.window.start(), &rows, records);
        }
        Ok(())
    }

    fn plan_pass(&self, initial: bool) -> Option<PassPlan<T, F>> {
        let mut state = self.state.lock();
        if !initial && !state.dirty {
            return None;
        }
        let Some(source) = state.source.clone() else {
            state.dirty = false;
            return None;
        };
        if initial && state.requested.is_empty() {
            state.requested = Range::with_length(0, state.config.min_push_size);
        }
        Some(PassPlan {
            source,
            template: state.template(),
            window: state.requested,
            reset: initial || state.reset != ResetKind::None,
            hard: state.reset == ResetKind::Hard,
            refreshed: state.pending_refresh.clone(),
        })
    }
}

fn same_generator<T>(a: &Arc<dyn DataGenerator<T>>, b: &Arc<dyn DataGenerator<T>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Changes the filter of the provider it was issued for.
///
/// Once another provider is installed the slot is expired and every update
/// fails with [`DataError::IllegalState`].
pub struct FilterSlot<T: DataItem, F> {
    communicator: Weak<DataCommunicator<T, F>>,
    generation: u64,
}

impl<T: DataItem, F> Clone for FilterSlot<T, F> {
    fn clone(&self) -> Self {
        Self {
            communicator: self.communicator.clone(),
            generation: self.generation,
        }
    }
}

impl<T: DataItem, F: FilterValue> FilterSlot<T, F> {
    /// Replaces the filter. Setting an equal filter does nothing.
    pub fn set_filter(&self, filter: Option<F>) -> Result<()> {
        let communicator = self
            .communicator
            .upgrade()
            .ok_or_else(|| DataError::illegal_state("data communicator no longer exists"))?;
        if communicator.generation() != self.generation {
            return Err(DataError::illegal_state(
                "filter slot belongs to a replaced data provider",
            ));
        }
        communicator.set_filter(filter)
    }

    /// Returns `true` while the slot's provider is installed.
    pub fn is_valid(&self) -> bool {
        self.communicator
            .upgrade()
            .is_some_and(|communicator| communicator.generation() == self.generation)
    }
}

static_assertions::assert_impl_all!(DataCommunicator<String, String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::{ClientCommand, RecordingChannel};
    use crate::provider::{ListDataProvider, Predicate};
    use std::collections::HashMap;

    type Items = Arc<ListDataProvider<&'static str>>;

    type Communicator = Arc<DataCommunicator<&'static str, Predicate<&'static str>>>;

    fn setup(items: Vec<&'static str>) -> (Communicator, Arc<RecordingChannel>, Items) {
        let channel = Arc::new(RecordingChannel::new());
        let communicator: Communicator = CommunicatorBuilder::new()
            .min_push_size(3)
            .build(channel.clone());
        let provider = Arc::new(ListDataProvider::new(items));
        communicator.set_data_provider(AnyDataProvider::Flat(provider.clone()), None);
        communicator.attach();
        (communicator, channel, provider)
    }

    fn keys(records: &[RowRecord]) -> Vec<String> {
        records
            .iter()
            .map(|record| record[fields::KEY].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Records lifecycle calls per item.
    #[derive(Default)]
    struct Tracking {
        destroyed: Mutex<Vec<&'static str>>,
        destroyed_all: Mutex<usize>,
        refreshed: Mutex<HashMap<&'static str, usize>>,
    }

    impl DataGenerator<&'static str> for Tracking {
        fn generate_data(&self, item: &&'static str, record: &mut RowRecord) -> Result<()> {
            record.insert("len".into(), item.len().into());
            Ok(())
        }

        fn destroy_data(&self, item: &&'static str) {
            self.destroyed.lock().push(item);
        }

        fn destroy_all_data(&self) {
            *self.destroyed_all.lock() += 1;
        }

        fn refresh_data(&self, item: &&'static str) {
            *self.refreshed.lock().entry(item).or_default() += 1;
        }
    }

    #[test]
    fn test_initial_pass_pushes_first_window() {
        let (communicator, channel, _) = setup(vec!["a", "bb", "c", "d"]);
        communicator.before_client_response(true).unwrap();

        let commands = channel.take();
        assert_eq!(commands[0], ClientCommand::Reset { size: 4 });
        let ClientCommand::SetData {
            first_index,
            records,
        } = &commands[1]
        else {
            panic!("expected set data, got {commands:?}");
        };
        assert_eq!(*first_index, 0);
        assert_eq!(records.len(), 3);
        assert_eq!(communicator.active_items().len(), 3);
        assert!(!communicator.is_dirty());

        // Nothing changed: the next pass is silent.
        communicator.before_client_response(false).unwrap();
        assert!(channel.take().is_empty());
    }

    #[test]
    fn test_request_rows_and_drop_rows() {
        let (communicator, channel, _) = setup(vec!["a", "b", "c", "d", "e"]);
        let tracking = Arc::new(Tracking::default());
        communicator.add_data_generator(tracking.clone());
        communicator.before_client_response(true).unwrap();
        let first = channel.take();
        let ClientCommand::SetData { records, .. } = &first[1] else {
            panic!("expected set data");
        };
        let first_keys = keys(records);
        assert_eq!(records[0]["len"], 1);

        communicator.on_drop_rows(&first_keys[..1]);
        assert_eq!(communicator.dropped_count(), 1);
        communicator.handle_client_command(ServerCommand::RequestRows {
            first_row_index: 3,
            number_of_rows: 2,
            first_cached_row_index: 1,
            cache_size: 4,
        });
        communicator.before_client_response(false).unwrap();

        let commands = channel.take();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], ClientCommand::SetData { first_index: 3, .. }));
        assert_eq!(*tracking.destroyed.lock(), vec!["a"]);
        assert_eq!(communicator.key_of(&"a"), None);
        assert_eq!(communicator.item_for_key(&first_keys[1]), Some("b"));
    }

    #[test]
    fn test_refresh_only_active_rows() {
        let (communicator, channel, provider) = setup(vec!["a", "b", "c", "d"]);
        let tracking = Arc::new(Tracking::default());
        communicator.add_data_generator(tracking.clone());
        communicator.before_client_response(true).unwrap();
        channel.take();

        communicator.refresh(&"d");
        assert!(!communicator.is_dirty());

        provider.refresh_item(&"b");
        provider.refresh_item(&"b");
        assert!(communicator.is_dirty());
        communicator.before_client_response(false).unwrap();

        let commands = channel.take();
        let [ClientCommand::UpdateData { records }] = commands.as_slice() else {
            panic!("expected one update, got {commands:?}");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(tracking.refreshed.lock().get("b"), Some(&1));
    }

    #[test]
    fn test_filter_slot_expires_with_provider() {
        let (communicator, channel, _) = setup(vec!["a", "bb", "ccc"]);
        let provider = AnyDataProvider::flat(ListDataProvider::new(vec!["x", "yy"]));
        let slot = communicator.set_data_provider(provider, None);
        communicator.before_client_response(true).unwrap();
        channel.take();

        let long = Predicate::new(|item: &&str| item.len() > 1);
        slot.set_filter(Some(long.clone())).unwrap();
        assert!(communicator.is_dirty());
        assert_eq!(communicator.data_provider_size().unwrap(), 1);

        // Same filter object again: no reset scheduled.
        communicator.before_client_response(false).unwrap();
        channel.take();
        slot.set_filter(Some(long)).unwrap();
        assert!(!communicator.is_dirty());

        let replacement = communicator.set_data_provider(
            AnyDataProvider::flat(ListDataProvider::new(vec!["z"])),
            None,
        );
        assert!(!slot.is_valid());
        assert!(replacement.is_valid());
        assert!(slot.set_filter(None).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_sorting_changes_schedule_soft_reset() {
        let (communicator, channel, _) = setup(vec!["b", "c", "a"]);
        communicator.before_client_response(true).unwrap();
        channel.take();

        communicator
            .set_in_memory_sorting(Some(Comparator::natural()))
            .unwrap();
        assert_eq!(
            communicator.fetch_items_with_range(0, 2).unwrap(),
            vec!["a", "b"]
        );
        communicator.before_client_response(false).unwrap();
        assert_eq!(channel.take(), vec![ClientCommand::Reset { size: 3 }]);
        assert_eq!(communicator.active_items().len(), 3);
    }

    #[test]
    fn test_eager_reset_responds_immediately() {
        let channel = Arc::new(RecordingChannel::new());
        let communicator = DataCommunicator::<u32, ()>::builder()
            .min_push_size(2)
            .eager_reset(true)
            .build::<()>(channel.clone());
        communicator.set_data_provider(
            AnyDataProvider::flat(crate::provider::CallbackDataProvider::new(
                |query: &Query<u32, ()>| {
                    Ok((0..5).skip(query.offset()).take(query.limit()).collect())
                },
                |_: &Query<u32, ()>| Ok(5),
            )),
            None,
        );
        communicator.before_client_response(true).unwrap();
        channel.take();

        communicator.reset().unwrap();
        let commands = channel.take();
        assert_eq!(commands[0], ClientCommand::Reset { size: 5 });
        assert!(matches!(commands[1], ClientCommand::SetData { first_index: 0, .. }));
    }

    #[test]
    fn test_failed_fetch_sends_nothing() {
        let channel = Arc::new(RecordingChannel::new());
        let communicator: Arc<DataCommunicator<u32, ()>> = DataCommunicator::new(channel.clone());
        communicator.set_data_provider(
            AnyDataProvider::flat(crate::provider::CallbackDataProvider::new(
                |_: &Query<u32, ()>| Err(DataError::backend("connection refused")),
                |_: &Query<u32, ()>| Ok(5),
            )),
            None,
        );
        assert!(communicator.before_client_response(true).is_err());
        assert!(channel.commands().is_empty());
        assert!(communicator.is_dirty());
    }

    #[test]
    fn test_no_provider_is_quiet() {
        let channel = Arc::new(RecordingChannel::new());
        let communicator: Arc<DataCommunicator<u32, ()>> = DataCommunicator::new(channel.clone());
        communicator.before_client_response(true).unwrap();
        assert!(channel.commands().is_empty());
        assert!(communicator.data_provider_size().unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_detach_stops_listening() {
        let (communicator, _, provider) = setup(vec!["a"]);
        assert_eq!(provider.signals().listener_count(), 1);
        communicator.detach();
        assert_eq!(provider.signals().listener_count(), 0);
        communicator.attach();
        assert_eq!(provider.signals().listener_count(), 1);
    }
}
