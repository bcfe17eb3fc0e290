use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::session::{Session, SessionProvider};

pub mod appointments;
pub mod children;
pub mod schedule;

pub use appointments::AppointmentStore;
pub use children::ChildStore;
pub use schedule::ScheduleStore;

type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// What every store needs from the outside world.
#[derive(Clone)]
pub struct StoreContext {
    pub backend: Arc<dyn Backend>,
    pub session: Arc<dyn SessionProvider>,
    pub request_timeout: Duration,
    today: Today,
}

impl StoreContext {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<dyn SessionProvider>, request_timeout: Duration) -> Self {
        Self {
            backend,
            session,
            request_timeout,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Pins "today", for date validation in tests.
    pub fn with_today(mut self, date: NaiveDate) -> Self {
        self.today = Arc::new(move || date);
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    pub fn require_session(&self) -> ClientResult<Session> {
        self.session.current().ok_or_else(ClientError::please_log_in)
    }

    /// Runs a backend call under the request timeout so a hung request
    /// surfaces as a retryable error instead of a perpetual spinner.
    pub async fn call<T, F>(&self, fut: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(self.request_timeout)),
        }
    }
}
