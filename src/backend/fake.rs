//! In-memory backend for store tests. Counts calls per endpoint so tests can
//! assert that validation failures never reach the network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::Backend;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    Appointment, AppointmentUpdate, CartItem, CheckoutRequest, ChildProfile, Feedback, FeedbackRequest, NewChild,
    Reaction,
};
use crate::status::AppointmentStatus;
use crate::time_start::{TimeOfDay, TimeShape, TimeStartWire};

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub appointments: Mutex<Vec<Appointment>>,
    pub feedback: Mutex<HashMap<String, Feedback>>,
    pub reactions: Mutex<HashMap<String, Reaction>>,
    pub children: Mutex<Vec<ChildProfile>>,
    pub cart: Mutex<Vec<CartItem>>,
    pub checkout_response: Mutex<String>,
    pub last_checkout: Mutex<Option<CheckoutRequest>>,
    pub last_update: Mutex<Option<AppointmentUpdate>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail: Mutex<Option<ClientError>>,
    rejected_shape: Mutex<Option<TimeShape>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn with_appointments(items: Vec<Appointment>) -> Self {
        let fake = Self::default();
        *fake.appointments.lock().unwrap() = items;
        fake
    }

    pub fn appointment(id: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            appointment_id: id.to_string(),
            status,
            appointment_date: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
            time_start: TimeOfDay::new(9, 0).unwrap(),
            children_name: Some("Bé Na".into()),
            children_gender: Some("Nữ".into()),
            date_of_birth: NaiveDate::from_ymd_opt(2025, 3, 1),
            medical_issue: None,
            note: None,
            payment_method: Some("ONLINE".into()),
            vaccine_details_list: vec![],
            reactions: None,
            feedbacks: None,
        }
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn fail_with(&self, err: ClientError) {
        *self.fail.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.fail.lock().unwrap() = None;
    }

    pub fn reject_time_shape(&self, shape: TimeShape) {
        *self.rejected_shape.lock().unwrap() = Some(shape);
    }

    pub fn delay_by(&self, d: Duration) {
        *self.delay.lock().unwrap() = Some(d);
    }

    async fn enter(&self, endpoint: &'static str) -> ClientResult<()> {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        match self.fail.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn shape_of(wire: &TimeStartWire) -> TimeShape {
    match wire {
        TimeStartWire::Structured { .. } => TimeShape::Structured,
        TimeStartWire::Text(_) => TimeShape::Text,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_appointments(&self, _token: &str, _user_id: &str) -> ClientResult<Vec<Appointment>> {
        self.enter("fetch_appointments").await?;
        Ok(self.appointments.lock().unwrap().clone())
    }

    async fn cancel_appointment(&self, _token: &str, appointment_id: &str, _reason: &str) -> ClientResult<()> {
        self.enter("cancel_appointment").await?;
        for a in self.appointments.lock().unwrap().iter_mut() {
            if a.appointment_id == appointment_id {
                a.status = AppointmentStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn update_appointment(
        &self,
        _token: &str,
        appointment_id: &str,
        payload: &AppointmentUpdate,
    ) -> ClientResult<()> {
        self.enter("update_appointment").await?;
        if *self.rejected_shape.lock().unwrap() == Some(shape_of(&payload.time_start)) {
            return Err(ClientError::Backend {
                status: 400,
                code: "BAD_REQUEST".into(),
                message: "cannot parse timeStart".into(),
            });
        }
        for a in self.appointments.lock().unwrap().iter_mut() {
            if a.appointment_id == appointment_id {
                a.appointment_date = payload.appointment_date;
                a.note = payload.note.clone();
                a.time_start = match &payload.time_start {
                    TimeStartWire::Structured { hour, minute, .. } => TimeOfDay::new(*hour, *minute).unwrap(),
                    TimeStartWire::Text(s) => TimeOfDay::parse(s).unwrap(),
                };
            }
        }
        *self.last_update.lock().unwrap() = Some(payload.clone());
        Ok(())
    }

    async fn fetch_all_feedback(&self, _token: &str) -> ClientResult<Vec<Feedback>> {
        self.enter("fetch_all_feedback").await?;
        Ok(self.feedback.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_feedback(&self, _token: &str, appointment_id: &str) -> ClientResult<Option<Feedback>> {
        self.enter("fetch_feedback").await?;
        Ok(self.feedback.lock().unwrap().get(appointment_id).cloned())
    }

    async fn post_feedback(&self, _token: &str, req: &FeedbackRequest) -> ClientResult<Feedback> {
        self.enter("post_feedback").await?;
        let fb = Feedback {
            appointment_id: Some(req.appointment_id.clone()),
            rating: req.rating,
            context: req.context.clone(),
            create_at: Some("2026-10-19T08:00:00".into()),
        };
        self.feedback
            .lock()
            .unwrap()
            .insert(req.appointment_id.clone(), fb.clone());
        Ok(fb)
    }

    async fn fetch_all_reactions(&self, _token: &str) -> ClientResult<Vec<Reaction>> {
        self.enter("fetch_all_reactions").await?;
        Ok(self.reactions.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_reaction(&self, _token: &str, appointment_id: &str) -> ClientResult<Option<Reaction>> {
        self.enter("fetch_reaction").await?;
        Ok(self.reactions.lock().unwrap().get(appointment_id).cloned())
    }

    async fn add_cart_item(&self, _token: &str, _user_id: &str, item: &CartItem) -> ClientResult<()> {
        self.enter("add_cart_item").await?;
        self.cart.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn remove_cart_item(&self, _token: &str, _user_id: &str, vaccine_details_id: &str) -> ClientResult<()> {
        self.enter("remove_cart_item").await?;
        self.cart
            .lock()
            .unwrap()
            .retain(|i| i.vaccine_details_id != vaccine_details_id);
        Ok(())
    }

    async fn checkout(&self, _token: &str, _user_id: &str, req: &CheckoutRequest) -> ClientResult<String> {
        self.enter("checkout").await?;
        *self.last_checkout.lock().unwrap() = Some(req.clone());
        Ok(self.checkout_response.lock().unwrap().clone())
    }

    async fn fetch_children(&self, _token: &str, _user_id: &str) -> ClientResult<Vec<ChildProfile>> {
        self.enter("fetch_children").await?;
        Ok(self.children.lock().unwrap().clone())
    }

    async fn create_child(&self, _token: &str, _user_id: &str, child: &NewChild) -> ClientResult<ChildProfile> {
        self.enter("create_child").await?;
        let mut children = self.children.lock().unwrap();
        let created = ChildProfile {
            children_id: format!("C{}", children.len() + 1),
            children_name: child.children_name.clone(),
            date_of_birth: child.date_of_birth.unwrap(),
            gender: child.gender.clone().unwrap_or_default(),
            medical_issue: child.medical_issue.clone(),
        };
        children.push(created.clone());
        Ok(created)
    }

    async fn update_child(&self, _token: &str, child: &ChildProfile) -> ClientResult<ChildProfile> {
        self.enter("update_child").await?;
        for c in self.children.lock().unwrap().iter_mut() {
            if c.children_id == child.children_id {
                *c = child.clone();
            }
        }
        Ok(child.clone())
    }

    async fn delete_child(&self, _token: &str, children_id: &str) -> ClientResult<()> {
        self.enter("delete_child").await?;
        self.children.lock().unwrap().retain(|c| c.children_id != children_id);
        Ok(())
    }
}
