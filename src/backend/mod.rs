//! The REST backend, as seen from the client.
//!
//! Every call takes the bearer token explicitly; stores read it from the
//! injected session provider and never reach the backend without one.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::models::{
    Appointment, AppointmentUpdate, CartItem, CheckoutRequest, ChildProfile, Feedback, FeedbackRequest,
    NewChild, Reaction,
};

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_appointments(&self, token: &str, user_id: &str) -> ClientResult<Vec<Appointment>>;
    async fn cancel_appointment(&self, token: &str, appointment_id: &str, reason: &str) -> ClientResult<()>;
    async fn update_appointment(
        &self,
        token: &str,
        appointment_id: &str,
        payload: &AppointmentUpdate,
    ) -> ClientResult<()>;

    async fn fetch_all_feedback(&self, token: &str) -> ClientResult<Vec<Feedback>>;
    async fn fetch_feedback(&self, token: &str, appointment_id: &str) -> ClientResult<Option<Feedback>>;
    async fn post_feedback(&self, token: &str, req: &FeedbackRequest) -> ClientResult<Feedback>;

    async fn fetch_all_reactions(&self, token: &str) -> ClientResult<Vec<Reaction>>;
    async fn fetch_reaction(&self, token: &str, appointment_id: &str) -> ClientResult<Option<Reaction>>;

    async fn add_cart_item(&self, token: &str, user_id: &str, item: &CartItem) -> ClientResult<()>;
    async fn remove_cart_item(&self, token: &str, user_id: &str, vaccine_details_id: &str) -> ClientResult<()>;
    /// Returns the raw response body; the caller decides whether it is a
    /// usable payment URL.
    async fn checkout(&self, token: &str, user_id: &str, req: &CheckoutRequest) -> ClientResult<String>;

    async fn fetch_children(&self, token: &str, user_id: &str) -> ClientResult<Vec<ChildProfile>>;
    async fn create_child(&self, token: &str, user_id: &str, child: &NewChild) -> ClientResult<ChildProfile>;
    async fn update_child(&self, token: &str, child: &ChildProfile) -> ClientResult<ChildProfile>;
    async fn delete_child(&self, token: &str, children_id: &str) -> ClientResult<()>;
}
