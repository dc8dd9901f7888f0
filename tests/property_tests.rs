//! Property-based tests for the room board and reservation filtering.
//!
//! These tests use proptest to check invariants of the pure reconciliation,
//! occupancy and upcoming-filter functions over generated inputs.

use campusdesk_api::{
    entities::{room, room_availability, room_reservation, RoomStatus},
    services::{
        occupancy::{current_occupant, is_active},
        reservations::{filter_upcoming, minutes_since_midnight},
        room_status::{latest_entries, reconcile_rooms, reconcile_status},
    },
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
}

fn status_text_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("available".to_string())),
        Just(Some("occupied".to_string())),
        Just(Some("maintenance".to_string())),
        Just(Some("bogus".to_string())),
    ]
}

fn time_strategy() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn now_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (time_strategy()).prop_map(|t| base_day().and_time(t))
}

fn room_with(status: Option<String>, is_available: bool) -> room::Model {
    room::Model {
        id: Uuid::new_v4(),
        name: "Generated".into(),
        room_type: "classroom".into(),
        capacity: 20,
        floor: 0,
        building_id: Uuid::nil(),
        is_available,
        status,
        current_occupant: None,
        updated_at: Utc::now(),
    }
}

fn log_strategy() -> impl Strategy<Value = Vec<(i64, Option<String>, Option<bool>)>> {
    prop::collection::vec(
        (0i64..10_000, status_text_strategy(), prop::option::of(any::<bool>())),
        0..12,
    )
}

fn reservation_strategy() -> impl Strategy<Value = room_reservation::Model> {
    (-3i64..4, time_strategy(), 1i64..240, any::<bool>()).prop_map(
        |(day_offset, start, length, completed)| {
            let end = start + Duration::minutes(length);
            // Keep the window inside one day
            let end = if end < start {
                NaiveTime::from_hms_opt(23, 59, 0).unwrap()
            } else {
                end
            };
            room_reservation::Model {
                id: Uuid::new_v4(),
                room_id: Uuid::nil(),
                faculty_id: Uuid::new_v4(),
                faculty_name: "Generated".into(),
                date: base_day() + Duration::days(day_offset),
                start_time: start,
                end_time: end,
                purpose: "Generated".into(),
                status: if completed { "completed" } else { "scheduled" }.to_string(),
                created_at: Utc::now(),
            }
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn reconciled_availability_matches_status(
        status in status_text_strategy(),
        flag in any::<bool>(),
        entries in log_strategy(),
    ) {
        let room = room_with(status, flag);
        let log: Vec<room_availability::Model> = entries
            .into_iter()
            .map(|(offset, status, is_available)| room_availability::Model {
                id: Uuid::new_v4(),
                room_id: room.id,
                is_available,
                status,
                created_at: Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap(),
                created_by: None,
            })
            .collect();

        let views = reconcile_rooms(std::slice::from_ref(&room), &log);
        prop_assert_eq!(views.len(), 1);
        prop_assert_eq!(views[0].is_available, views[0].status == RoomStatus::Available);
    }

    #[test]
    fn explicit_room_status_always_wins(
        status in prop_oneof![
            Just(RoomStatus::Available),
            Just(RoomStatus::Occupied),
            Just(RoomStatus::Maintenance),
        ],
        log_status in status_text_strategy(),
        log_flag in prop::option::of(any::<bool>()),
    ) {
        let room = room_with(Some(status.as_str().to_string()), false);
        let entry = room_availability::Model {
            id: Uuid::new_v4(),
            room_id: room.id,
            is_available: log_flag,
            status: log_status,
            created_at: Utc::now(),
            created_by: None,
        };
        let (resolved, available) = reconcile_status(&room, Some(&entry));
        prop_assert_eq!(resolved, status);
        prop_assert_eq!(available, status.is_available());
    }

    #[test]
    fn latest_entry_is_order_independent(offsets in prop::collection::vec(0i64..10_000, 1..10)) {
        let room_id = Uuid::new_v4();
        let mut log: Vec<room_availability::Model> = offsets
            .iter()
            .map(|offset| room_availability::Model {
                id: Uuid::new_v4(),
                room_id,
                is_available: None,
                status: None,
                created_at: Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap(),
                created_by: None,
            })
            .collect();

        let forward = latest_entries(&log)[&room_id].created_at;
        log.reverse();
        let backward = latest_entries(&log)[&room_id].created_at;
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(forward, log.iter().map(|e| e.created_at).max().unwrap());
    }

    #[test]
    fn upcoming_never_contains_finished_or_completed(
        reservations in prop::collection::vec(reservation_strategy(), 0..20),
        now in now_strategy(),
    ) {
        let kept = filter_upcoming(reservations.clone(), now);
        for r in &kept {
            prop_assert!(!r.is_completed());
            prop_assert!(r.date >= now.date());
            if r.date == now.date() {
                prop_assert!(minutes_since_midnight(r.end_time) > minutes_since_midnight(now.time()));
            }
        }

        // Order is preserved
        let positions: Vec<usize> = kept
            .iter()
            .map(|k| reservations.iter().position(|r| r.id == k.id).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn occupant_comes_from_an_active_reservation_when_one_exists(
        reservations in prop::collection::vec(reservation_strategy(), 0..10),
        now in now_strategy(),
        room_is_available in any::<bool>(),
    ) {
        let occupant = current_occupant(
            Uuid::nil(),
            &reservations,
            room_is_available,
            Some("Fallback"),
            now,
        );
        let active = reservations.iter().find(|r| is_active(r, now));
        match active {
            Some(r) => prop_assert_eq!(occupant, Some(r.faculty_name.clone())),
            None if room_is_available => prop_assert_eq!(occupant, None),
            None => prop_assert_eq!(occupant.as_deref(), Some("Fallback")),
        }
    }
}
