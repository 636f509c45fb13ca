use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AvailabilityTemplate, Slot, SlotQueryResult, UnavailabilityException};

/// Map a calendar date onto the template day-of-week encoding
/// (0 = Sunday, 1 = Monday, etc.).
pub fn day_of_week(date: NaiveDate) -> i16 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Enumerate the fixed slot grid for one doctor on one date.
///
/// Pure and lock-free: exclusivity only matters at the read-then-book
/// step, which the scheduling service guards separately. Slots taken by
/// a booking or fully contained in a partial-day exception window stay
/// in the grid flagged unavailable; a missing/inactive/malformed
/// template or a whole-day exception yields an empty grid.
pub fn generate_slots(
    doctor_id: Uuid,
    date: NaiveDate,
    template: Option<&AvailabilityTemplate>,
    exceptions: &[UnavailabilityException],
    booked_starts: &HashSet<NaiveTime>,
) -> SlotQueryResult {
    let Some(template) = template.filter(|t| t.is_active) else {
        debug!(%doctor_id, %date, "no active availability template for this weekday");
        return SlotQueryResult::empty(doctor_id, date);
    };

    if !template.is_well_formed() {
        warn!(
            %doctor_id, %date, template_id = %template.id,
            "malformed availability template, degrading to empty availability"
        );
        return SlotQueryResult::empty(doctor_id, date);
    }

    for exception in exceptions {
        if exception.is_whole_day() {
            debug!(%doctor_id, %date, "whole-day unavailability exception, no slots");
            return SlotQueryResult::empty(doctor_id, date);
        }
        if exception.start_time.is_some() != exception.end_time.is_some() {
            warn!(
                %doctor_id, %date, exception_id = %exception.id,
                "half-open unavailability exception, degrading to empty availability"
            );
            return SlotQueryResult::empty(doctor_id, date);
        }
    }

    let slot_len = Duration::minutes(template.slot_duration_minutes as i64);
    let step = slot_len + Duration::minutes(template.break_duration_minutes as i64);

    // A candidate is valid while its start falls inside the window; a
    // start at or past end_time walks off the day and is excluded.
    let mut slots = Vec::new();
    let mut cursor = template.start_time;
    while cursor < template.end_time {
        let slot_end = cursor + slot_len;
        // Wrapping past midnight means the grid walked off the day.
        if slot_end <= cursor {
            break;
        }

        let booked = booked_starts.contains(&cursor);
        let blocked = exceptions.iter().any(|ex| ex.covers(cursor, slot_end));
        slots.push(Slot {
            start_time: cursor,
            end_time: slot_end,
            available: !booked && !blocked,
        });

        let next = cursor + step;
        if next <= cursor {
            break;
        }
        cursor = next;
    }

    SlotQueryResult { doctor_id, date, slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn test_date() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn morning_template(start: NaiveTime, end: NaiveTime, slot: i32, brk: i32) -> AvailabilityTemplate {
        AvailabilityTemplate {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: day_of_week(test_date()),
            start_time: start,
            end_time: end,
            slot_duration_minutes: slot,
            break_duration_minutes: brk,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn exception(start: Option<NaiveTime>, end: Option<NaiveTime>) -> UnavailabilityException {
        UnavailabilityException {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: test_date(),
            start_time: start,
            end_time: end,
            reason: Some("blocked".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn walks_the_grid_in_slot_plus_break_steps() {
        let template = morning_template(time(9, 0), time(12, 0), 30, 10);
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[],
            &HashSet::new(),
        );

        let starts: Vec<NaiveTime> = result.slots.iter().map(|s| s.start_time).collect();
        assert_eq!(
            starts,
            vec![time(9, 0), time(9, 40), time(10, 20), time(11, 0), time(11, 40)]
        );
        assert!(result.slots.iter().all(|s| s.available));
        assert!(result
            .slots
            .iter()
            .all(|s| s.end_time - s.start_time == Duration::minutes(30)));
    }

    #[test]
    fn slot_count_matches_the_window_arithmetic() {
        let template = morning_template(time(8, 0), time(17, 0), 20, 5);
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[],
            &HashSet::new(),
        );

        // 9h window, 25-minute stride, last start at 16:45.
        assert_eq!(result.slots.len(), 22);
        for pair in result.slots.windows(2) {
            assert!(pair[1].start_time - pair[0].end_time >= Duration::minutes(5));
        }
    }

    #[test]
    fn booked_start_times_are_flagged_unavailable() {
        let template = morning_template(time(9, 0), time(12, 0), 30, 10);
        let booked: HashSet<NaiveTime> = [time(9, 40)].into_iter().collect();
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[],
            &booked,
        );

        assert!(!result.is_start_available(time(9, 40)));
        assert!(result.is_start_available(time(9, 0)));
        assert_eq!(result.available_slots().count(), 4);
    }

    #[test]
    fn whole_day_exception_empties_the_grid() {
        let template = morning_template(time(9, 0), time(12, 0), 30, 0);
        let booked: HashSet<NaiveTime> = [time(9, 0)].into_iter().collect();
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[exception(None, None)],
            &booked,
        );

        assert!(result.slots.is_empty());
    }

    #[test]
    fn fully_contained_slots_are_blocked_by_partial_exceptions() {
        let template = morning_template(time(9, 0), time(12, 0), 30, 10);
        let lunch = exception(Some(time(10, 0)), Some(time(11, 30)));
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[lunch],
            &HashSet::new(),
        );

        // 10:20-10:50 sits inside the window; 09:40-10:10 only brushes it.
        assert!(!result.is_start_available(time(10, 20)));
        assert!(result.is_start_available(time(9, 40)));
        assert!(result.is_start_available(time(11, 40)));
    }

    #[test]
    fn overlapping_exceptions_are_applied_independently() {
        let template = morning_template(time(9, 0), time(12, 0), 30, 0);
        let first = exception(Some(time(9, 0)), Some(time(10, 0)));
        let second = exception(Some(time(9, 30)), Some(time(11, 0)));
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[first, second],
            &HashSet::new(),
        );

        assert!(!result.is_start_available(time(9, 0)));
        assert!(!result.is_start_available(time(9, 30)));
        assert!(!result.is_start_available(time(10, 0)));
        assert!(result.is_start_available(time(11, 0)));
    }

    #[test]
    fn misconfigured_templates_yield_empty_not_errors() {
        let inverted = morning_template(time(12, 0), time(9, 0), 30, 0);
        assert!(generate_slots(
            inverted.doctor_id,
            test_date(),
            Some(&inverted),
            &[],
            &HashSet::new()
        )
        .slots
        .is_empty());

        let zero_slot = morning_template(time(9, 0), time(12, 0), 0, 0);
        assert!(generate_slots(
            zero_slot.doctor_id,
            test_date(),
            Some(&zero_slot),
            &[],
            &HashSet::new()
        )
        .slots
        .is_empty());
    }

    #[test]
    fn inactive_or_missing_templates_yield_empty() {
        let mut template = morning_template(time(9, 0), time(12, 0), 30, 0);
        template.is_active = false;
        assert!(generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[],
            &HashSet::new()
        )
        .slots
        .is_empty());

        assert!(
            generate_slots(Uuid::new_v4(), test_date(), None, &[], &HashSet::new())
                .slots
                .is_empty()
        );
    }

    #[test]
    fn starts_at_or_past_the_window_end_are_excluded() {
        // The 12:20 candidate would start exactly at the window end.
        let template = morning_template(time(9, 0), time(12, 20), 30, 10);
        let result = generate_slots(
            template.doctor_id,
            test_date(),
            Some(&template),
            &[],
            &HashSet::new(),
        );

        assert_eq!(result.slots.len(), 5);
        let last = result.slots.last().unwrap();
        assert_eq!(last.start_time, time(11, 40));
        assert_eq!(last.end_time, time(12, 10));
    }

    #[test]
    fn weekday_mapping_starts_the_week_on_sunday() {
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()), 0);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()), 1);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()), 6);
    }
}
