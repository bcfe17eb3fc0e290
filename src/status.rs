//! Canonical appointment status and the normalizer that maps raw backend
//! strings onto it.
//!
//! The backend is inconsistent about status spelling (`"Cancelled"`,
//! `"Canceled"`, `"Đã hủy"`, `"COMPLETED"`, ...). Every status that enters
//! the crate goes through [`normalize`], usually via the `Deserialize` impl,
//! so nothing downstream ever compares raw strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    NotPaid,
    Pending,
    VerifiedComing,
    Cancelled,
    Completed,
    /// A value the normalizer did not recognize, kept verbatim.
    Unknown(String),
}

impl AppointmentStatus {
    /// Canonical wire spelling. Feeding it back through [`normalize`]
    /// yields the same status.
    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::NotPaid => "Not Paid",
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::VerifiedComing => "Verified Coming",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AppointmentStatus::Unknown(_))
    }
}

const CANCELLED_EXACT: [&str; 4] = ["Cancelled", "Canceled", "Stored Vaccine", "Đã hủy"];

pub fn normalize(raw: &str) -> AppointmentStatus {
    let trimmed = raw.trim();
    if CANCELLED_EXACT.contains(&trimmed) {
        return AppointmentStatus::Cancelled;
    }

    let lower = trimmed.to_lowercase();
    if lower.contains("hủy") || lower.contains("cancel") {
        return AppointmentStatus::Cancelled;
    }

    // "Not Paid", "NOT_PAID", "NotPaid" all collapse to the same key
    let key: String = lower
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();

    match key.as_str() {
        "notpaid" => AppointmentStatus::NotPaid,
        "pending" => AppointmentStatus::Pending,
        "verifiedcoming" => AppointmentStatus::VerifiedComing,
        "completed" => AppointmentStatus::Completed,
        _ => AppointmentStatus::Unknown(raw.to_string()),
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AppointmentStatus {
    fn from(raw: &str) -> Self {
        normalize(raw)
    }
}

impl Serialize for AppointmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize(raw.as_deref().unwrap_or("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Cancelled",
        "Canceled",
        "Stored Vaccine",
        "Đã hủy",
        "Lịch đã bị HỦY",
        "CANCELLED_BY_STAFF",
        "Not Paid",
        "NOT_PAID",
        "Pending",
        "pending ",
        "Verified Coming",
        "VerifiedComing",
        "Completed",
        "COMPLETED",
        "Rescheduled",
        "",
        "  spaced  ",
    ];

    #[test]
    fn cancel_synonyms_collapse() {
        for raw in ["Cancelled", "Canceled", "Stored Vaccine", "Đã hủy", "user cancel", "ĐÃ HỦY LỊCH"] {
            assert_eq!(normalize(raw), AppointmentStatus::Cancelled, "{raw}");
        }
    }

    #[test]
    fn known_statuses_ignore_case_and_separators() {
        assert_eq!(normalize("Not Paid"), AppointmentStatus::NotPaid);
        assert_eq!(normalize("NOT_PAID"), AppointmentStatus::NotPaid);
        assert_eq!(normalize("Pending"), AppointmentStatus::Pending);
        assert_eq!(normalize("Verified Coming"), AppointmentStatus::VerifiedComing);
        assert_eq!(normalize("COMPLETED"), AppointmentStatus::Completed);
    }

    #[test]
    fn unknown_passes_through_verbatim() {
        assert_eq!(
            normalize("Rescheduled"),
            AppointmentStatus::Unknown("Rescheduled".into())
        );
        assert_eq!(normalize("Rescheduled").as_str(), "Rescheduled");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in SAMPLES {
            let once = normalize(raw);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "{raw:?}");
        }
    }

    #[test]
    fn deserializes_through_normalizer() {
        let s: AppointmentStatus = serde_json::from_str(r#""Đã hủy""#).unwrap();
        assert_eq!(s, AppointmentStatus::Cancelled);
        let s: AppointmentStatus = serde_json::from_str("null").unwrap();
        assert_eq!(s, AppointmentStatus::Unknown(String::new()));
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::VerifiedComing).unwrap(),
            r#""Verified Coming""#
        );
    }
}
