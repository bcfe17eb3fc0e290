//! Joins appointment rows with side data (feedback, post-injection
//! reactions) fetched separately by a view.
//!
//! A column loads its whole side-map once. Rows the bulk load has nothing
//! for are looked up one by one, and only when the row can have side data
//! at all. An applicable row reads as loading until its data arrives or its
//! own lookup comes back empty. Each view owns its own columns; nothing is
//! shared.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::models::{Appointment, Feedback, Reaction, dedup_appointments};
use crate::permissions::can_feedback;
use crate::status::AppointmentStatus;
use crate::stores::StoreContext;

#[derive(Debug, Clone, PartialEq)]
pub enum RowState<T> {
    Loading,
    Present(T),
    /// Nothing yet, and the user can do something about it ("rate now").
    AbsentActionable,
    /// Nothing, and nothing to do ("N/A").
    AbsentTerminal,
}

/// One kind of side data.
#[async_trait]
pub trait SideSource: Send + Sync {
    type Item: Clone + Send + Sync;

    /// Appointment the item belongs to.
    fn key(&self, item: &Self::Item) -> Option<String>;

    /// Side data already embedded in the appointment record.
    fn embedded(&self, appointment: &Appointment) -> Option<Self::Item>;

    /// Whether a row can carry this side data at all.
    fn applicable(&self, appointment: &Appointment) -> bool;

    /// Whether an absent entry can be acted on from the row.
    fn actionable(&self, appointment: &Appointment) -> bool;

    async fn fetch_all(&self, backend: &dyn Backend, token: &str) -> ClientResult<Vec<Self::Item>>;

    async fn fetch_one(&self, backend: &dyn Backend, token: &str, appointment_id: &str) -> ClientResult<Option<Self::Item>>;
}

#[derive(Debug, Default)]
pub struct FeedbackSource;

#[async_trait]
impl SideSource for FeedbackSource {
    type Item = Feedback;

    fn key(&self, item: &Feedback) -> Option<String> {
        item.appointment_id.clone()
    }

    fn embedded(&self, appointment: &Appointment) -> Option<Feedback> {
        appointment.feedbacks.clone()
    }

    fn applicable(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::Completed
    }

    fn actionable(&self, appointment: &Appointment) -> bool {
        can_feedback(&appointment.status)
    }

    async fn fetch_all(&self, backend: &dyn Backend, token: &str) -> ClientResult<Vec<Feedback>> {
        backend.fetch_all_feedback(token).await
    }

    async fn fetch_one(&self, backend: &dyn Backend, token: &str, appointment_id: &str) -> ClientResult<Option<Feedback>> {
        backend.fetch_feedback(token, appointment_id).await
    }
}

#[derive(Debug, Default)]
pub struct ReactionSource;

#[async_trait]
impl SideSource for ReactionSource {
    type Item = Reaction;

    fn key(&self, item: &Reaction) -> Option<String> {
        item.appointment_id.clone()
    }

    fn embedded(&self, appointment: &Appointment) -> Option<Reaction> {
        appointment.reactions.clone()
    }

    fn applicable(&self, appointment: &Appointment) -> bool {
        matches!(
            appointment.status,
            AppointmentStatus::VerifiedComing | AppointmentStatus::Completed
        )
    }

    // staff record the reaction while the child is still on site
    fn actionable(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::VerifiedComing
    }

    async fn fetch_all(&self, backend: &dyn Backend, token: &str) -> ClientResult<Vec<Reaction>> {
        backend.fetch_all_reactions(token).await
    }

    async fn fetch_one(&self, backend: &dyn Backend, token: &str, appointment_id: &str) -> ClientResult<Option<Reaction>> {
        backend.fetch_reaction(token, appointment_id).await
    }
}

struct ColumnState<T> {
    bulk_loaded: bool,
    bulk_loading: bool,
    entries: HashMap<String, T>,
    in_flight: HashSet<String>,
    // looked up individually and found nothing
    checked: HashSet<String>,
}

impl<T> Default for ColumnState<T> {
    fn default() -> Self {
        Self {
            bulk_loaded: false,
            bulk_loading: false,
            entries: HashMap::new(),
            in_flight: HashSet::new(),
            checked: HashSet::new(),
        }
    }
}

pub struct SideColumn<S: SideSource> {
    ctx: StoreContext,
    state: RwLock<ColumnState<S::Item>>,
    source: S,
}

pub type FeedbackColumn = SideColumn<FeedbackSource>;
pub type ReactionColumn = SideColumn<ReactionSource>;

impl<S: SideSource + Default> SideColumn<S> {
    pub fn new(ctx: StoreContext) -> Self {
        Self::with_source(S::default(), ctx)
    }
}

impl<S: SideSource> SideColumn<S> {
    pub fn with_source(source: S, ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(ColumnState::default()),
            source,
        }
    }

    /// One-time bulk load. Later calls do nothing. A failed load leaves the
    /// map empty and rows fall back to individual lookups.
    pub async fn load_bulk(&self) {
        {
            let mut st = self.state.write().await;
            if st.bulk_loaded || st.bulk_loading {
                return;
            }
            st.bulk_loading = true;
        }

        let result = match self.ctx.session.current() {
            Some(session) => {
                self.ctx
                    .call(self.source.fetch_all(self.ctx.backend.as_ref(), &session.token))
                    .await
            }
            None => Err(ClientError::please_log_in()),
        };

        let mut st = self.state.write().await;
        st.bulk_loading = false;
        st.bulk_loaded = true;
        match result {
            Ok(items) => {
                for item in items {
                    if let Some(key) = self.source.key(&item) {
                        st.entries.entry(key).or_insert(item);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "side-map bulk load failed"),
        }
    }

    pub async fn row_state(&self, appointment: &Appointment) -> RowState<S::Item> {
        let st = self.state.read().await;
        self.resolve(&st, appointment)
    }

    /// Rows for a table, duplicates dropped, each with its side-data state.
    pub async fn rows(&self, appointments: &[Appointment]) -> Vec<(Appointment, RowState<S::Item>)> {
        let st = self.state.read().await;
        dedup_appointments(appointments.to_vec())
            .into_iter()
            .map(|a| {
                let state = self.resolve(&st, &a);
                (a, state)
            })
            .collect()
    }

    /// Individually looks up applicable rows the bulk map has nothing for.
    /// Returns how many lookups were made.
    pub async fn fill_missing(&self, appointments: &[Appointment]) -> usize {
        let Some(session) = self.ctx.session.current() else {
            return 0;
        };

        let wanted: Vec<String> = {
            let mut st = self.state.write().await;
            if !st.bulk_loaded {
                return 0;
            }
            let mut wanted = Vec::new();
            for a in appointments {
                let id = &a.appointment_id;
                if !self.source.applicable(a)
                    || self.source.embedded(a).is_some()
                    || st.entries.contains_key(id)
                    || st.checked.contains(id)
                    || st.in_flight.contains(id)
                {
                    continue;
                }
                st.in_flight.insert(id.clone());
                wanted.push(id.clone());
            }
            wanted
        };

        for id in &wanted {
            let result = self
                .ctx
                .call(self.source.fetch_one(self.ctx.backend.as_ref(), &session.token, id))
                .await;

            let mut st = self.state.write().await;
            st.in_flight.remove(id);
            match result {
                Ok(Some(item)) => {
                    st.entries.insert(id.clone(), item);
                }
                Ok(None) => {
                    st.checked.insert(id.clone());
                }
                Err(e) => {
                    tracing::warn!(appointment_id = %id, error = %e, "row side-data lookup failed");
                    st.checked.insert(id.clone());
                }
            }
        }
        wanted.len()
    }

    /// Drops a row's lookup result, e.g. after the user rated it.
    pub async fn invalidate(&self, appointment_id: &str) {
        let mut st = self.state.write().await;
        st.entries.remove(appointment_id);
        st.checked.remove(appointment_id);
    }

    fn resolve(&self, st: &ColumnState<S::Item>, a: &Appointment) -> RowState<S::Item> {
        if let Some(item) = st.entries.get(&a.appointment_id) {
            return RowState::Present(item.clone());
        }
        if let Some(item) = self.source.embedded(a) {
            return RowState::Present(item);
        }
        if !self.source.applicable(a) {
            return RowState::AbsentTerminal;
        }
        // absent only once this row's own lookup settled
        if !st.checked.contains(&a.appointment_id) {
            return RowState::Loading;
        }
        if self.source.actionable(a) {
            RowState::AbsentActionable
        } else {
            RowState::AbsentTerminal
        }
    }
}
