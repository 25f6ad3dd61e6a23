use serde::Serialize;
use sqlx::FromRow;

/// One weekly block: a weekday and an inclusive period range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct TimeSlot {
    pub weekday: i64,
    pub start_period: i64,
    pub end_period: i64,
}

impl TimeSlot {
    /// Same weekday and the inclusive period ranges share at least one period.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.weekday == other.weekday
            && self.start_period <= other.end_period
            && self.end_period >= other.start_period
    }
}

/// A slot the student already occupies through an active enrollment.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledSlot {
    pub offering_id: i64,
    pub course_name: String,
    #[sqlx(flatten)]
    pub slot: TimeSlot,
}

/// Returns the first occupied slot that collides with any of `requested`.
pub fn find_conflict<'a>(requested: &[TimeSlot], occupied: &'a [ScheduledSlot]) -> Option<&'a ScheduledSlot> {
    occupied
        .iter()
        .find(|taken| requested.iter().any(|slot| slot.overlaps(&taken.slot)))
}
