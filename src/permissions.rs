//! Single source of truth for what a user may do with an appointment, and
//! how a status is shown. Views must not re-derive any of this.

use crate::status::AppointmentStatus;

pub fn can_cancel_appointment(status: &AppointmentStatus) -> bool {
    *status == AppointmentStatus::Pending
}

pub fn can_edit_time(status: &AppointmentStatus) -> bool {
    *status == AppointmentStatus::Pending
}

pub fn can_feedback(status: &AppointmentStatus) -> bool {
    *status == AppointmentStatus::Completed
}

/// Lifecycle edges. Only `Pending -> Cancelled` is ever driven by this
/// client; the others happen on the backend (payment, staff) and arrive
/// through a refetch.
pub fn can_transition(from: &AppointmentStatus, to: &AppointmentStatus) -> bool {
    use AppointmentStatus::*;
    matches!(
        (from, to),
        (NotPaid, Pending) | (Pending, VerifiedComing) | (Pending, Cancelled) | (VerifiedComing, Completed)
    )
}

pub fn status_label(status: &AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::NotPaid => "Chưa thanh toán",
        AppointmentStatus::Pending => "Chờ xác nhận",
        AppointmentStatus::VerifiedComing => "Đã xác nhận",
        AppointmentStatus::Cancelled => "Đã hủy",
        AppointmentStatus::Completed => "Đã hoàn thành",
        AppointmentStatus::Unknown(_) => "Không xác định",
    }
}

/// Badge class for the status pill.
pub fn status_class(status: &AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::NotPaid => "status-not-paid",
        AppointmentStatus::Pending => "status-pending",
        AppointmentStatus::VerifiedComing => "status-verified",
        AppointmentStatus::Cancelled => "status-cancelled",
        AppointmentStatus::Completed => "status-completed",
        AppointmentStatus::Unknown(_) => "status-unknown",
    }
}

/// Actions a view may render for a row, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cancel,
    EditTime,
    Feedback,
}

pub fn allowed_actions(status: &AppointmentStatus) -> Vec<Action> {
    let mut actions = Vec::new();
    if can_edit_time(status) {
        actions.push(Action::EditTime);
    }
    if can_cancel_appointment(status) {
        actions.push(Action::Cancel);
    }
    if can_feedback(status) {
        actions.push(Action::Feedback);
    }
    actions
}
