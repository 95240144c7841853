//! Turns raw per-staff open-slot feeds from the scheduling backend into a
//! date-keyed, deduplicated, customer-facing slot index, and maps selections
//! back to the appointment segments a booking request needs.

use crate::models::{normalize_duration_minutes, Service};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use utoipa::ToSchema;

/// One open window reported for a staff member. `start_at` keeps the offset
/// the backend sent; the date component in that offset is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilitySlot {
    pub start_at: DateTime<FixedOffset>,
    /// May arrive in minutes or milliseconds depending on the backend path
    pub duration_minutes: i64,
}

/// Per-staff feed entry for a queried date range.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffAvailability {
    pub staff_id: String,
    pub staff_name: String,
    pub slots: Vec<AvailabilitySlot>,
}

/// One service-staff-duration-start tuple within a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppointmentSegment {
    pub service_id: String,
    pub team_member_id: String,
    pub duration_minutes: i64,
    pub start_at: DateTime<Utc>,
}

/// A bookable instant, ready for the calendar UI.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvedSlot {
    pub start_at: DateTime<FixedOffset>,
    pub location_id: String,
    /// Rendered in the business display offset, e.g. "9:00 AM"
    pub display_time: String,
    pub segments: Vec<AppointmentSegment>,
}

pub struct AvailabilityResolver {
    location_id: String,
    display_offset: FixedOffset,
}

impl AvailabilityResolver {
    pub fn new(location_id: impl Into<String>, display_offset: FixedOffset) -> Self {
        Self {
            location_id: location_id.into(),
            display_offset,
        }
    }

    /// Build the date-keyed slot index for one requested service.
    ///
    /// Bucketing truncates each slot's `start_at` to its calendar day in the
    /// offset the backend sent, with no timezone shifting. Within a bucket,
    /// two slots at the identical instant are the same bookable time and
    /// collapse to one entry, whichever staff feed produced them. Each entry
    /// carries a single segment referencing the requested service id, never
    /// an id embedded in the feed.
    pub fn resolve(
        &self,
        requested_service_id: &str,
        feeds: &[StaffAvailability],
    ) -> BTreeMap<NaiveDate, Vec<ResolvedSlot>> {
        let mut index: BTreeMap<NaiveDate, Vec<ResolvedSlot>> = BTreeMap::new();
        let mut seen: BTreeMap<NaiveDate, HashSet<DateTime<Utc>>> = BTreeMap::new();

        for feed in feeds {
            for slot in &feed.slots {
                let date = slot.start_at.date_naive();
                let instant = slot.start_at.with_timezone(&Utc);

                if !seen.entry(date).or_default().insert(instant) {
                    continue;
                }

                index.entry(date).or_default().push(ResolvedSlot {
                    start_at: slot.start_at,
                    location_id: self.location_id.clone(),
                    display_time: self.format_display_time(&slot.start_at),
                    segments: vec![AppointmentSegment {
                        service_id: requested_service_id.to_string(),
                        team_member_id: feed.staff_id.clone(),
                        duration_minutes: normalize_duration_minutes(slot.duration_minutes),
                        start_at: instant,
                    }],
                });
            }
        }

        for bucket in index.values_mut() {
            bucket.sort_by_key(|slot| slot.start_at.with_timezone(&Utc));
        }

        index
    }

    fn format_display_time(&self, start_at: &DateTime<FixedOffset>) -> String {
        start_at
            .with_timezone(&self.display_offset)
            .format("%-I:%M %p")
            .to_string()
    }
}

/// Segments for a (possibly multi-service) selection: back-to-back, each
/// offset from the overall start by the cumulative duration of the services
/// scheduled before it, in selection order.
pub fn build_segments(
    start_at: DateTime<Utc>,
    services: &[Service],
    team_member_id: &str,
) -> Vec<AppointmentSegment> {
    let mut offset_minutes = 0i64;
    services
        .iter()
        .map(|service| {
            let duration = service.duration_mins();
            let segment = AppointmentSegment {
                service_id: service.id.clone(),
                team_member_id: team_member_id.to_string(),
                duration_minutes: duration,
                start_at: start_at + Duration::minutes(offset_minutes),
            };
            offset_minutes += duration;
            segment
        })
        .collect()
}
