//! Cart, child selection and booking draft, up to the checkout that hands
//! back a payment URL.
//!
//! The cart lives in client storage and is mirrored to the backend when a
//! session exists. Mirroring is best-effort: local state is authoritative.
//! A cart built while logged out is not merged with any server-side cart on
//! login.

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreContext;
use crate::error::{ClientError, ClientResult};
use crate::models::{AppointmentDraft, CartItem, CheckoutRequest, ChildSelection};
use crate::session::{CART_KEY, KeyValueStore, read_json, write_json};

/// Something the view should tell the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AlreadyInCart { vaccine_details_id: String, dose_name: String },
    CartSyncFailed { vaccine_details_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyInCart,
}

#[derive(Default)]
struct State {
    cart: Vec<CartItem>,
    selected_child: Option<ChildSelection>,
    draft: AppointmentDraft,
    notices: Vec<Notice>,
}

#[derive(Clone)]
pub struct ScheduleStore {
    ctx: StoreContext,
    storage: Arc<dyn KeyValueStore>,
    state: Arc<RwLock<State>>,
}

impl ScheduleStore {
    /// Restores the persisted cart. An unreadable cart starts empty.
    pub fn new(ctx: StoreContext, storage: Arc<dyn KeyValueStore>) -> Self {
        let cart = match read_json::<Vec<CartItem>>(storage.as_ref(), CART_KEY) {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "persisted cart unreadable, starting empty");
                Vec::new()
            }
        };

        Self {
            ctx,
            storage,
            state: Arc::new(RwLock::new(State {
                cart,
                ..State::default()
            })),
        }
    }

    pub async fn cart(&self) -> Vec<CartItem> {
        self.state.read().await.cart.clone()
    }

    pub async fn cart_total(&self) -> f64 {
        self.state.read().await.cart.iter().map(|i| i.price).sum()
    }

    pub async fn add_to_cart(&self, mut item: CartItem) -> AddOutcome {
        item.quantity = 1;
        {
            let mut st = self.state.write().await;
            if st.cart.iter().any(|i| i.vaccine_details_id == item.vaccine_details_id) {
                tracing::info!(vaccine_details_id = %item.vaccine_details_id, "dose already in cart");
                st.notices.push(Notice::AlreadyInCart {
                    vaccine_details_id: item.vaccine_details_id,
                    dose_name: item.dose_name,
                });
                return AddOutcome::AlreadyInCart;
            }
            st.cart.push(item.clone());
            self.persist(&st.cart);
        }

        if let Some(session) = self.ctx.session.current() {
            let synced = self
                .ctx
                .call(self.ctx.backend.add_cart_item(&session.token, &session.user_id, &item))
                .await;
            if let Err(e) = synced {
                tracing::warn!(vaccine_details_id = %item.vaccine_details_id, error = %e, "cart add not mirrored");
                self.notify(Notice::CartSyncFailed {
                    vaccine_details_id: item.vaccine_details_id,
                })
                .await;
            }
        }
        AddOutcome::Added
    }

    /// Returns whether the item was in the cart.
    pub async fn remove_from_cart(&self, vaccine_details_id: &str) -> bool {
        let removed = {
            let mut st = self.state.write().await;
            let before = st.cart.len();
            st.cart.retain(|i| i.vaccine_details_id != vaccine_details_id);
            let removed = st.cart.len() != before;
            if removed {
                self.persist(&st.cart);
            }
            removed
        };

        if let Some(session) = self.ctx.session.current() {
            let synced = self
                .ctx
                .call(
                    self.ctx
                        .backend
                        .remove_cart_item(&session.token, &session.user_id, vaccine_details_id),
                )
                .await;
            if let Err(e) = synced {
                tracing::warn!(vaccine_details_id, error = %e, "cart removal not mirrored");
            }
        }
        removed
    }

    pub async fn clear_cart(&self) {
        let mut st = self.state.write().await;
        st.cart.clear();
        self.persist(&st.cart);
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.write().await.notices)
    }

    pub async fn select_child(&self, selection: Option<ChildSelection>) {
        self.state.write().await.selected_child = selection;
    }

    pub async fn selected_child(&self) -> Option<ChildSelection> {
        self.state.read().await.selected_child.clone()
    }

    pub async fn update_draft<F: FnOnce(&mut AppointmentDraft)>(&self, f: F) {
        f(&mut self.state.write().await.draft);
    }

    pub async fn draft(&self) -> AppointmentDraft {
        self.state.read().await.draft.clone()
    }

    /// Checkout with the child and draft held by the store.
    pub async fn checkout_current(&self) -> ClientResult<String> {
        let (selection, draft) = {
            let st = self.state.read().await;
            (st.selected_child.clone(), st.draft.clone())
        };
        self.checkout(selection.as_ref(), &draft).await
    }

    /// Validates the booking, posts it and returns the payment redirect URL.
    /// The cart is emptied once the backend hands back a usable URL.
    pub async fn checkout(&self, selection: Option<&ChildSelection>, draft: &AppointmentDraft) -> ClientResult<String> {
        let cart = self.cart().await;
        let req = validate_checkout(selection, draft, &cart, self.ctx.today())?;
        let session = self.ctx.require_session()?;

        let body = self
            .ctx
            .call(self.ctx.backend.checkout(&session.token, &session.user_id, &req))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "checkout failed"))?;

        let url = body.trim().trim_matches('"');
        if !url.starts_with("http") {
            tracing::warn!(client_ref = %req.client_ref, "checkout answered without a payment URL");
            return Err(ClientError::invalid_payment_url(&body));
        }

        self.clear_cart().await;
        tracing::info!(client_ref = %req.client_ref, doses = req.vaccine_details_ids.len(), "checkout accepted");
        Ok(url.to_string())
    }

    async fn notify(&self, notice: Notice) {
        self.state.write().await.notices.push(notice);
    }

    fn persist(&self, cart: &[CartItem]) {
        if let Err(e) = write_json(self.storage.as_ref(), CART_KEY, &cart) {
            tracing::warn!(error = %e, "cart not persisted");
        }
    }
}

/// Field-level checks, in the order the booking form shows them.
pub fn validate_checkout(
    selection: Option<&ChildSelection>,
    draft: &AppointmentDraft,
    cart: &[CartItem],
    today: NaiveDate,
) -> ClientResult<CheckoutRequest> {
    let (child_id, child) = match selection {
        None => return Err(ClientError::validation("child", "Please select a child or enter the child's details")),
        Some(ChildSelection::Existing(id)) if id.trim().is_empty() => {
            return Err(ClientError::validation("child", "Please select a child or enter the child's details"));
        }
        Some(ChildSelection::Existing(id)) => (Some(id.clone()), None),
        Some(ChildSelection::New(c)) => {
            if c.children_name.trim().is_empty() {
                return Err(ClientError::validation("childrenName", "Please enter the child's name"));
            }
            match c.date_of_birth {
                None => return Err(ClientError::validation("dateOfBirth", "Please enter the child's date of birth")),
                Some(dob) if dob > today => {
                    return Err(ClientError::validation("dateOfBirth", "Date of birth cannot be in the future"));
                }
                Some(_) => {}
            }
            if c.gender.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ClientError::validation("gender", "Please choose the child's gender"));
            }
            (None, Some(c.clone()))
        }
    };

    let appointment_date = match draft.preferred_date {
        None => return Err(ClientError::validation("preferredDate", "Please choose a vaccination date")),
        Some(d) if d < today => {
            return Err(ClientError::validation("preferredDate", "The vaccination date cannot be in the past"));
        }
        Some(d) => d,
    };
    let Some(time) = draft.preferred_time else {
        return Err(ClientError::validation("preferredTime", "Please choose a vaccination time"));
    };
    if !draft.terms_accepted {
        return Err(ClientError::validation("termsAccepted", "Please accept the terms before booking"));
    }
    if cart.is_empty() {
        return Err(ClientError::validation("cart", "Your cart is empty"));
    }

    Ok(CheckoutRequest {
        client_ref: Uuid::new_v4(),
        child_id,
        child,
        appointment_date,
        time_start: time.to_string(),
        payment_method: draft.payment_method,
        note: draft.note.clone().filter(|n| !n.trim().is_empty()),
        vaccine_details_ids: cart.iter().map(|i| i.vaccine_details_id.clone()).collect(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    Years(u32),
    Months(u32),
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Age::Years(n) => write!(f, "{n} tuổi"),
            Age::Months(n) => write!(f, "{n} tháng"),
        }
    }
}

/// Whole years from the first birthday on, whole months before it.
/// Months are counted on the calendar: a month is complete once the day of
/// month has been reached.
pub fn calculate_age(date_of_birth: NaiveDate, today: NaiveDate) -> Age {
    let mut months = (today.year() - date_of_birth.year()) * 12 + today.month() as i32 - date_of_birth.month() as i32;
    if today.day() < date_of_birth.day() {
        months -= 1;
    }
    let months = months.max(0) as u32;
    if months >= 12 {
        Age::Years(months / 12)
    } else {
        Age::Months(months)
    }
}
