//! Appointment store: the user's appointments, kept normalized and
//! deduplicated, with the mutations the user may perform on them.
//!
//! Mutations patch local state only after the backend accepted them, then
//! schedule a background refetch. Nothing orders a refetch against a newer
//! local patch; the last fetch wins.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::StoreContext;
use crate::error::{ClientError, ClientResult};
use crate::models::{Appointment, Feedback, FeedbackRequest, dedup_appointments};
use crate::permissions::{can_cancel_appointment, can_edit_time, can_feedback};
use crate::status::{AppointmentStatus, normalize};
use crate::time_start::{ShapePreference, TimeOfDay, update_with_fallback};

#[derive(Default)]
struct State {
    items: Vec<Appointment>,
    loading: bool,
    last_error: Option<ClientError>,
}

#[derive(Clone)]
pub struct AppointmentStore {
    ctx: StoreContext,
    state: Arc<RwLock<State>>,
    time_shape: Arc<ShapePreference>,
    refresh: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppointmentStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: Arc::new(RwLock::new(State::default())),
            time_shape: Arc::new(ShapePreference::default()),
            refresh: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn appointments(&self) -> Vec<Appointment> {
        self.state.read().await.items.clone()
    }

    pub async fn get(&self, appointment_id: &str) -> Option<Appointment> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|a| a.appointment_id == appointment_id)
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Why the last fetch came back empty, if it failed.
    pub async fn last_error(&self) -> Option<ClientError> {
        self.state.read().await.last_error.clone()
    }

    /// Replaces the collection with the user's appointments. Never fails:
    /// errors leave an empty collection and are reported via `last_error`.
    pub async fn fetch_all(&self, user_id: &str) {
        let Some(session) = self.ctx.session.current() else {
            tracing::warn!(user_id, "fetch appointments without a session");
            let mut st = self.state.write().await;
            st.items.clear();
            st.last_error = Some(ClientError::please_log_in());
            return;
        };

        self.state.write().await.loading = true;
        let result = self
            .ctx
            .call(self.ctx.backend.fetch_appointments(&session.token, user_id))
            .await;

        let mut st = self.state.write().await;
        st.loading = false;
        match result {
            Ok(items) => {
                let fetched = items.len();
                let items: Vec<Appointment> = items
                    .into_iter()
                    .map(|mut a| {
                        a.status = normalize(a.status.as_str());
                        a
                    })
                    .collect();
                st.items = dedup_appointments(items);
                if st.items.len() != fetched {
                    tracing::debug!(
                        user_id,
                        dropped = fetched - st.items.len(),
                        "duplicate appointments collapsed"
                    );
                }
                st.last_error = None;
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "fetch appointments failed");
                st.items.clear();
                st.last_error = Some(e);
            }
        }
    }

    /// `fetch_all` for the logged-in user.
    pub async fn refresh(&self) {
        match self.ctx.session.current() {
            Some(session) => self.fetch_all(&session.user_id).await,
            None => self.fetch_all("").await,
        }
    }

    pub async fn cancel(&self, appointment_id: &str, reason: &str) -> ClientResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ClientError::validation("reason", "Please give a reason for cancelling"));
        }

        let status = self.status_of(appointment_id).await?;
        if !can_cancel_appointment(&status) {
            return Err(ClientError::NotPermitted(
                "CANNOT_CANCEL",
                format!("appointment {appointment_id} is {status} and can no longer be cancelled"),
            ));
        }

        let session = self.ctx.require_session()?;
        self.ctx
            .call(
                self.ctx
                    .backend
                    .cancel_appointment(&session.token, appointment_id, reason),
            )
            .await
            .inspect_err(|e| tracing::warn!(appointment_id, error = %e, "cancel failed"))?;

        self.patch(appointment_id, |a| a.status = AppointmentStatus::Cancelled)
            .await;
        tracing::info!(appointment_id, "appointment cancelled");

        self.schedule_refresh(session.user_id);
        Ok(())
    }

    /// Reschedules the appointment `appointment` refers to. Only its id is
    /// taken from the caller; status and the rest of the PUT body come from
    /// the store's current record.
    pub async fn edit_time(
        &self,
        appointment: &Appointment,
        new_time: TimeOfDay,
        new_date: NaiveDate,
        new_note: Option<String>,
    ) -> ClientResult<()> {
        let appointment_id = appointment.appointment_id.as_str();
        let current = self
            .get(appointment_id)
            .await
            .ok_or_else(|| ClientError::appointment_not_found(appointment_id))?;
        if !can_edit_time(&current.status) {
            return Err(ClientError::NotPermitted(
                "CANNOT_EDIT_TIME",
                format!("appointment {appointment_id} is {} and its time can no longer change", current.status),
            ));
        }
        if new_date < self.ctx.today() {
            return Err(ClientError::validation("appointmentDate", "The new date cannot be in the past"));
        }
        if new_date < current.appointment_date {
            return Err(ClientError::validation(
                "appointmentDate",
                "The new date cannot be earlier than the booked date",
            ));
        }

        let session = self.ctx.require_session()?;

        let mut updated = current;
        updated.time_start = new_time;
        updated.appointment_date = new_date;
        updated.note = new_note;

        self.ctx
            .call(update_with_fallback(
                self.ctx.backend.as_ref(),
                &session.token,
                &updated,
                &self.time_shape,
            ))
            .await
            .inspect_err(|e| tracing::warn!(appointment_id, error = %e, "edit time failed"))?;

        self.patch(appointment_id, |a| {
            a.time_start = updated.time_start;
            a.appointment_date = updated.appointment_date;
            a.note = updated.note.clone();
        })
        .await;
        tracing::info!(appointment_id, date = %new_date, time = %new_time, "appointment rescheduled");

        self.schedule_refresh(session.user_id);
        Ok(())
    }

    pub async fn submit_feedback(&self, appointment_id: &str, rating: u8, text: &str) -> ClientResult<Feedback> {
        if !(1..=5).contains(&rating) {
            return Err(ClientError::validation("rating", "Rating must be between 1 and 5"));
        }

        let existing = self
            .get(appointment_id)
            .await
            .ok_or_else(|| ClientError::appointment_not_found(appointment_id))?;
        if !can_feedback(&existing.status) {
            return Err(ClientError::NotPermitted(
                "FEEDBACK_NOT_ALLOWED",
                "Feedback is only possible once the appointment is completed".into(),
            ));
        }
        if existing.feedbacks.is_some() {
            return Err(ClientError::NotPermitted(
                "FEEDBACK_EXISTS",
                "This appointment has already been rated".into(),
            ));
        }

        let session = self.ctx.require_session()?;
        let req = FeedbackRequest {
            appointment_id: appointment_id.to_string(),
            rating,
            context: text.trim().to_string(),
        };
        let feedback = self
            .ctx
            .call(self.ctx.backend.post_feedback(&session.token, &req))
            .await
            .inspect_err(|e| tracing::warn!(appointment_id, error = %e, "feedback failed"))?;

        let stored = feedback.clone();
        self.patch(appointment_id, move |a| a.feedbacks = Some(stored)).await;
        tracing::info!(appointment_id, rating, "feedback submitted");
        Ok(feedback)
    }

    /// Read-only lookup for row rendering; any failure reads as "no feedback".
    pub async fn get_feedback(&self, appointment_id: &str) -> Option<Feedback> {
        let session = self.ctx.session.current()?;
        match self
            .ctx
            .call(self.ctx.backend.fetch_feedback(&session.token, appointment_id))
            .await
        {
            Ok(feedback) => feedback,
            Err(e) => {
                tracing::warn!(appointment_id, error = %e, "feedback lookup failed");
                None
            }
        }
    }

    /// Waits for the background refetch started by the last mutation.
    pub async fn settle(&self) {
        let handle = match self.refresh.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background refresh task failed");
            }
        }
    }

    async fn status_of(&self, appointment_id: &str) -> ClientResult<AppointmentStatus> {
        self.get(appointment_id)
            .await
            .map(|a| a.status)
            .ok_or_else(|| ClientError::appointment_not_found(appointment_id))
    }

    async fn patch<F: FnOnce(&mut Appointment)>(&self, appointment_id: &str, f: F) {
        let mut st = self.state.write().await;
        if let Some(a) = st.items.iter_mut().find(|a| a.appointment_id == appointment_id) {
            f(a);
        }
    }

    fn schedule_refresh(&self, user_id: String) {
        let store = self.clone();
        let handle = tokio::spawn(async move { store.fetch_all(&user_id).await });
        match self.refresh.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }
}
