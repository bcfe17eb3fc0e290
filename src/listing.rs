//! Filtering, ordering and paging for appointment tables.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Appointment;
use crate::status::AppointmentStatus;

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    /// Case-insensitive match on child name or appointment id.
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn matches(&self, a: &Appointment) -> bool {
        if let Some(status) = &self.status {
            if &a.status != status {
                return false;
            }
        }
        if let Some(from) = self.from {
            if a.appointment_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if a.appointment_date > to {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                a.appointment_id.to_lowercase().contains(&needle)
                    || a
                        .children_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            }
        }
    }

    pub fn apply<'a>(&self, items: &'a [Appointment]) -> Vec<&'a Appointment> {
        items.iter().filter(|a| self.matches(a)).collect()
    }
}

/// Orders by date then start time; newest first when `newest_first`.
pub fn sort_by_schedule(items: &mut [&Appointment], newest_first: bool) {
    items.sort_by(|a, b| {
        let ord = (a.appointment_date, a.time_start).cmp(&(b.appointment_date, b.time_start));
        if newest_first { ord.reverse() } else { ord }
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped into `1..=total_pages`.
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// 1-based paging. An out-of-range page number lands on the nearest page;
/// an empty list still has one (empty) page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        per_page,
        total_items,
        total_pages,
    }
}
