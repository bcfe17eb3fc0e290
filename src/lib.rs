//! Client-side core of the vaccination center app: appointment lifecycle,
//! cart and checkout, child profiles, and the row reconciliation the staff
//! and history tables use. Talks to the REST backend through [`backend::Backend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod listing;
pub mod models;
pub mod permissions;
pub mod reconcile;
pub mod session;
pub mod status;
pub mod stores;
pub mod time_start;

pub use error::{ClientError, ClientResult};
pub use status::{AppointmentStatus, normalize};
