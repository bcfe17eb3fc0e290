use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::status::AppointmentStatus;
use crate::time_start::{TimeOfDay, TimeShape, TimeStartWire};

/* -------------------------
   Response envelope
--------------------------*/

/// Some endpoints answer `{ "data": ... }`, others the bare payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

/* -------------------------
   Appointment
--------------------------*/

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(deserialize_with = "id_string")]
    pub appointment_id: String,
    pub status: AppointmentStatus,
    pub appointment_date: NaiveDate,
    pub time_start: TimeOfDay,

    // snapshot of the child at booking time, not a live reference
    #[serde(default)]
    pub children_name: Option<String>,
    #[serde(default)]
    pub children_gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub medical_issue: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,

    #[serde(default)]
    pub vaccine_details_list: Vec<VaccineDetail>,
    #[serde(default, deserialize_with = "zero_or_one")]
    pub reactions: Option<Reaction>,
    #[serde(default, deserialize_with = "zero_or_one")]
    pub feedbacks: Option<Feedback>,
}

impl Appointment {
    pub fn total_price(&self) -> f64 {
        self.vaccine_details_list.iter().map(|d| d.price).sum()
    }

    /// "Hexaxim + Rotateq", the way the list views show planned doses.
    pub fn dose_summary(&self) -> String {
        if self.vaccine_details_list.is_empty() {
            return "(no vaccines)".into();
        }
        self.vaccine_details_list
            .iter()
            .map(|d| d.dose_name.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineDetail {
    #[serde(default)]
    pub vaccine_details_id: Option<String>,
    pub dose_name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub current_dose: Option<u32>,
    #[serde(default)]
    pub dose_require: Option<u32>,
}

/// Post-injection reaction recorded by staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub qualified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(default)]
    pub appointment_id: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub context: String,
    // kept as text: the backend mixes zoned and naive timestamps
    #[serde(default)]
    pub create_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub appointment_id: String,
    pub rating: u8,
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// Full update payload. The backend replaces the whole record, so every
/// snapshot field travels along with the edited ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    pub appointment_id: String,
    pub status: AppointmentStatus,
    pub appointment_date: NaiveDate,
    pub time_start: TimeStartWire,
    pub children_name: Option<String>,
    pub children_gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_issue: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub vaccine_details_list: Vec<VaccineDetail>,
}

impl AppointmentUpdate {
    pub fn from_appointment(a: &Appointment, shape: TimeShape) -> Self {
        Self {
            appointment_id: a.appointment_id.clone(),
            status: a.status.clone(),
            appointment_date: a.appointment_date,
            time_start: TimeStartWire::encode(a.time_start, shape),
            children_name: a.children_name.clone(),
            children_gender: a.children_gender.clone(),
            date_of_birth: a.date_of_birth,
            medical_issue: a.medical_issue.clone(),
            note: a.note.clone(),
            payment_method: a.payment_method.clone(),
            vaccine_details_list: a.vaccine_details_list.clone(),
        }
    }
}

/// Keeps the first record for every `appointment_id`, preserving order.
pub fn dedup_appointments(items: Vec<Appointment>) -> Vec<Appointment> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|a| seen.insert(a.appointment_id.clone()))
        .collect()
}

/* -------------------------
   Cart / checkout
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(deserialize_with = "id_string")]
    pub vaccine_details_id: String,
    pub dose_name: String,
    pub price: f64,
    /// Always 1: a dose is booked once per appointment.
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub current_dose: Option<u32>,
    #[serde(default)]
    pub date_between_doses: Option<u32>,
}

fn one() -> u32 {
    1
}

impl CartItem {
    pub fn new(vaccine_details_id: impl Into<String>, dose_name: impl Into<String>, price: f64) -> Self {
        Self {
            vaccine_details_id: vaccine_details_id.into(),
            dose_name: dose_name.into(),
            price,
            quantity: 1,
            manufacturer: None,
            current_dose: None,
            date_between_doses: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Online,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChild {
    pub children_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_issue: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildSelection {
    Existing(String),
    New(NewChild),
}

/// In-progress booking form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentDraft {
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<TimeOfDay>,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Lets the backend drop a double-submitted checkout.
    pub client_ref: Uuid,
    pub child_id: Option<String>,
    pub child: Option<NewChild>,
    pub appointment_date: NaiveDate,
    pub time_start: String,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub vaccine_details_ids: Vec<String>,
}

/* -------------------------
   Child profiles
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProfile {
    #[serde(deserialize_with = "id_string")]
    pub children_id: String,
    pub children_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub medical_issue: Option<String>,
}

/* -------------------------
   Serde helpers
--------------------------*/

/// Ids arrive as strings from some endpoints and as numbers from others.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// `null`, a single object, or an array whose first element wins.
fn zero_or_one<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::Many(items)) => items.into_iter().next(),
        Some(OneOrMany::One(item)) => Some(item),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: serde_json::Value, status: &str, note: &str) -> serde_json::Value {
        json!({
            "appointmentId": id,
            "status": status,
            "appointmentDate": "2026-11-02",
            "timeStart": {"hour": 9, "minute": 0, "second": 0, "nano": 0},
            "childrenName": "Bé Na",
            "note": note,
            "vaccineDetailsList": [
                {"doseName": "Hexaxim", "price": 1015000.0, "currentDose": 1, "doseRequire": 3},
                {"doseName": "Rotateq", "price": 665000}
            ],
            "feedbacks": [],
            "reactions": {"condition": "Sốt nhẹ", "qualified": null}
        })
    }

    #[test]
    fn appointment_decodes_backend_shape() {
        let a: Appointment = serde_json::from_value(raw(json!(42), "Đã hủy", "n")).unwrap();
        assert_eq!(a.appointment_id, "42");
        assert_eq!(a.status, AppointmentStatus::Cancelled);
        assert_eq!(a.time_start, TimeOfDay { hour: 9, minute: 0 });
        assert_eq!(a.feedbacks, None);
        assert_eq!(a.reactions.as_ref().map(|r| r.qualified), Some(None));
        assert_eq!(a.dose_summary(), "Hexaxim + Rotateq");
        assert_eq!(a.total_price(), 1_680_000.0);
    }

    #[test]
    fn wrapped_and_bare_lists_decode_alike() {
        let bare: Envelope<Vec<Appointment>> =
            serde_json::from_value(json!([raw(json!("A1"), "Pending", "")])).unwrap();
        let wrapped: Envelope<Vec<Appointment>> =
            serde_json::from_value(json!({"data": [raw(json!("A1"), "Pending", "")]})).unwrap();
        assert_eq!(bare.into_inner(), wrapped.into_inner());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let first: Appointment = serde_json::from_value(raw(json!("A1"), "Pending", "first")).unwrap();
        let dup: Appointment = serde_json::from_value(raw(json!("A1"), "Completed", "second")).unwrap();
        let other: Appointment = serde_json::from_value(raw(json!("A2"), "Pending", "x")).unwrap();

        let out = dedup_appointments(vec![first.clone(), other.clone(), dup]);
        assert_eq!(out, vec![first, other]);
    }

    #[test]
    fn update_payload_carries_snapshot_and_requested_time_shape() {
        let a: Appointment = serde_json::from_value(raw(json!("A1"), "Pending", "n")).unwrap();
        let body = serde_json::to_value(AppointmentUpdate::from_appointment(&a, TimeShape::Text)).unwrap();
        assert_eq!(body["timeStart"], json!("09:00"));
        assert_eq!(body["status"], json!("Pending"));
        assert_eq!(body["childrenName"], json!("Bé Na"));
        assert_eq!(body["vaccineDetailsList"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn cart_item_quantity_defaults_to_one() {
        let item: CartItem =
            serde_json::from_value(json!({"vaccineDetailsId": 7, "doseName": "BCG", "price": 150000}))
                .unwrap();
        assert_eq!(item.vaccine_details_id, "7");
        assert_eq!(item.quantity, 1);
    }
}
