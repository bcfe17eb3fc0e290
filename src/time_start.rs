//! `timeStart` handling.
//!
//! The backend has been seen to send `timeStart` both as `"HH:MM"` and as a
//! `{hour, minute, second, nano}` object, and which one it accepts on update
//! is not documented. Internally the crate only knows [`TimeOfDay`]; the
//! wire shapes exist only at the backend boundary, and
//! [`update_with_fallback`] is the one place that probes them.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::models::{Appointment, AppointmentUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Accepts `HH:MM`, `HH:MM:SS` and `HH:MM:SS.fraction`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(':');
        let hour = parts.next()?.trim().parse().ok()?;
        let minute = parts.next()?.trim().parse().ok()?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Deserialize)]
struct StructuredTime {
    hour: u8,
    minute: u8,
    #[serde(default)]
    #[allow(dead_code)]
    second: u8,
    #[serde(default)]
    #[allow(dead_code)]
    nano: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Text(String),
    Structured(StructuredTime),
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawTime::deserialize(deserializer)? {
            RawTime::Text(s) => TimeOfDay::parse(&s),
            RawTime::Structured(t) => TimeOfDay::new(t.hour, t.minute),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("timeStart is not a valid time of day"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The two shapes `timeStart` can take on an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeShape {
    Structured,
    Text,
}

impl TimeShape {
    fn other(self) -> Self {
        match self {
            TimeShape::Structured => TimeShape::Text,
            TimeShape::Text => TimeShape::Structured,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TimeStartWire {
    Structured {
        hour: u8,
        minute: u8,
        second: u8,
        nano: u32,
    },
    Text(String),
}

impl TimeStartWire {
    pub fn encode(time: TimeOfDay, shape: TimeShape) -> Self {
        match shape {
            TimeShape::Structured => TimeStartWire::Structured {
                hour: time.hour,
                minute: time.minute,
                second: 0,
                nano: 0,
            },
            TimeShape::Text => TimeStartWire::Text(time.to_string()),
        }
    }
}

/// Last `timeStart` shape the backend accepted. Kept for logging; every
/// update still starts with the structured shape.
#[derive(Debug, Default)]
pub struct ShapePreference(Mutex<Option<TimeShape>>);

impl ShapePreference {
    pub fn last_accepted(&self) -> Option<TimeShape> {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Records `shape`, returning the previous value.
    fn remember(&self, shape: TimeShape) -> Option<TimeShape> {
        match self.0.lock() {
            Ok(mut guard) => guard.replace(shape),
            Err(poisoned) => poisoned.into_inner().replace(shape),
        }
    }
}

/// Sends an appointment update with the structured `timeStart` first and
/// the text form if the backend rejects it with a 4xx. Returns the shape
/// that was accepted.
pub async fn update_with_fallback(
    backend: &dyn Backend,
    token: &str,
    appointment: &Appointment,
    accepted: &ShapePreference,
) -> ClientResult<TimeShape> {
    let first = TimeShape::Structured;

    let shape = match send(backend, token, appointment, first).await {
        Ok(()) => first,
        Err(e) if e.is_client_rejection() => {
            let second = first.other();
            tracing::warn!(
                appointment_id = %appointment.appointment_id,
                rejected = ?first,
                error = %e,
                "timeStart shape rejected, retrying with {:?}",
                second
            );
            send(backend, token, appointment, second).await?;
            second
        }
        Err(e) => return Err(e),
    };

    let previous = accepted.remember(shape);
    if previous != Some(shape) {
        tracing::info!(appointment_id = %appointment.appointment_id, shape = ?shape, ?previous, "timeStart shape accepted");
    } else {
        tracing::debug!(appointment_id = %appointment.appointment_id, shape = ?shape, "timeStart accepted");
    }
    Ok(shape)
}

async fn send(
    backend: &dyn Backend,
    token: &str,
    appointment: &Appointment,
    shape: TimeShape,
) -> Result<(), ClientError> {
    let payload = AppointmentUpdate::from_appointment(appointment, shape);
    backend
        .update_appointment(token, &appointment.appointment_id, &payload)
        .await
}
