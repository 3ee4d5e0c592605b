use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;
use tokio::sync::Mutex;

use availability_cell::{
    AppointmentStatus, AvailabilityService, AvailabilityStore, BookedInterval, BookedSlotSource,
    ConflictMatch, ConsultationAvailability, FixedClock, InMemoryAvailabilityStore, LocalTime,
    SchedulingError, TimeSlot, UpdateScheduleRequest, WeeklySchedule, WeeklyScheduleEntry,
};

const DOCTOR: &str = "doctor-1";

fn d(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

fn t(raw: &str) -> LocalTime {
    raw.parse().unwrap()
}

fn starts(slots: &[TimeSlot]) -> Vec<String> {
    slots.iter().map(|s| s.start_time.to_string()).collect()
}

/// Monday 2026-10-19.
fn monday() -> NaiveDate {
    d("2026-10-19")
}

/// Tuesday 2026-10-20.
fn tuesday() -> NaiveDate {
    d("2026-10-20")
}

#[derive(Default)]
struct FakeBookings {
    intervals: Mutex<Vec<BookedInterval>>,
}

impl FakeBookings {
    async fn book(&self, date: NaiveDate, start: &str, end: &str, status: AppointmentStatus) {
        self.intervals.lock().await.push(BookedInterval {
            date,
            start_time: t(start),
            end_time: t(end),
            status,
        });
    }
}

#[async_trait]
impl BookedSlotSource for FakeBookings {
    async fn booked_intervals(
        &self,
        _doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        Ok(self
            .intervals
            .lock()
            .await
            .iter()
            .filter(|b| b.date == date)
            .cloned()
            .collect())
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl AvailabilityStore for Store {
        async fn find_by_doctor(
            &self,
            doctor_id: &str,
        ) -> Result<Option<ConsultationAvailability>, SchedulingError>;
        async fn save(
            &self,
            record: ConsultationAvailability,
        ) -> Result<ConsultationAvailability, SchedulingError>;
        async fn create_if_absent(
            &self,
            record: ConsultationAvailability,
        ) -> Result<ConsultationAvailability, SchedulingError>;
    }
}

mock! {
    pub Bookings {}

    #[async_trait]
    impl BookedSlotSource for Bookings {
        async fn booked_intervals(
            &self,
            doctor_id: &str,
            date: NaiveDate,
        ) -> Result<Vec<BookedInterval>, SchedulingError>;
    }
}

struct Harness {
    store: Arc<InMemoryAvailabilityStore>,
    bookings: Arc<FakeBookings>,
    service: AvailabilityService,
}

fn harness_at(date: NaiveDate, hours: u32, minutes: u32) -> Harness {
    let store = Arc::new(InMemoryAvailabilityStore::new());
    let bookings = Arc::new(FakeBookings::default());
    let service = AvailabilityService::new(
        store.clone(),
        bookings.clone(),
        Arc::new(FixedClock::at(date, hours, minutes)),
    );
    Harness { store, bookings, service }
}

async fn seeded_harness() -> Harness {
    let harness = harness_at(monday(), 8, 0);
    harness
        .store
        .save(ConsultationAvailability::with_defaults(DOCTOR))
        .await
        .unwrap();
    harness
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn first_read_creates_default_record_once() {
    let harness = harness_at(monday(), 8, 0);

    let first = harness.service.get_or_create_availability(DOCTOR).await.unwrap();
    let second = harness.service.get_or_create_availability(DOCTOR).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.consultation_fee, 500.0);
    assert_eq!(harness.store.record_count().await, 1);
}

#[tokio::test]
async fn schedule_update_defaults_fee_and_keeps_overrides() {
    let harness = seeded_harness().await;
    harness
        .service
        .set_unavailable_dates(DOCTOR, &[tuesday()], "Conference")
        .await
        .unwrap();

    let mut schedule = WeeklySchedule::default();
    schedule.monday = WeeklyScheduleEntry::working(t("10:00"), t("12:00"), 60);

    let updated = harness
        .service
        .update_weekly_schedule(
            DOCTOR,
            UpdateScheduleRequest {
                weekly_schedule: schedule.clone(),
                consultation_fee: None,
                emergency_available: Some(true),
                advance_booking_limit: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.weekly_schedule, schedule);
    assert_eq!(updated.consultation_fee, 500.0);
    assert!(updated.emergency_available);
    assert_eq!(updated.specific_dates.len(), 1);
}

#[tokio::test]
async fn schedule_update_rejects_invalid_template() {
    let harness = seeded_harness().await;
    let mut schedule = WeeklySchedule::default();
    schedule.friday = WeeklyScheduleEntry::working(t("17:00"), t("09:00"), 30);

    let result = harness
        .service
        .update_weekly_schedule(
            DOCTOR,
            UpdateScheduleRequest {
                weekly_schedule: schedule,
                consultation_fee: Some(750.0),
                emergency_available: None,
                advance_booking_limit: None,
            },
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidRequest(_)));
}

#[tokio::test]
async fn unavailable_dates_are_upserted_and_removable() {
    let harness = seeded_harness().await;

    harness
        .service
        .set_unavailable_dates(DOCTOR, &[tuesday()], "Conference")
        .await
        .unwrap();
    let record = harness
        .service
        .set_unavailable_dates(DOCTOR, &[tuesday(), d("2026-10-21")], "Leave")
        .await
        .unwrap();

    assert_eq!(record.specific_dates.len(), 2);
    assert!(record.specific_dates.iter().all(|o| !o.is_available && o.reason == "Leave"));

    let record = harness
        .service
        .remove_unavailable_dates(DOCTOR, &[tuesday(), d("2026-12-25")])
        .await
        .unwrap();
    assert_eq!(record.specific_dates.len(), 1);
    assert_eq!(record.specific_dates[0].date, d("2026-10-21"));
}

#[tokio::test]
async fn override_writes_require_existing_record() {
    let harness = harness_at(monday(), 8, 0);

    assert_matches!(
        harness.service.set_unavailable_dates(DOCTOR, &[tuesday()], "").await,
        Err(SchedulingError::NotFound(_))
    );
    assert_matches!(
        harness.service.remove_unavailable_dates(DOCTOR, &[tuesday()]).await,
        Err(SchedulingError::NotFound(_))
    );
}

// ==============================================================================
// SLOT QUERIES
// ==============================================================================

#[tokio::test]
async fn default_weekday_yields_fourteen_slots_with_fee() {
    let harness = seeded_harness().await;

    let day = harness.service.get_slots_for_date(DOCTOR, tuesday()).await.unwrap();

    assert_eq!(day.fee, 500.0);
    assert_eq!(day.slots.len(), 14);
    assert_eq!(day.slots[0], TimeSlot::new(t("09:00"), t("09:30")));
    assert_eq!(day.slots[7], TimeSlot::new(t("12:30"), t("13:00")));
    assert_eq!(day.slots[8], TimeSlot::new(t("14:00"), t("14:30")));
    assert!(!starts(&day.slots).contains(&"13:00".to_string()));
}

#[tokio::test]
async fn unknown_doctor_is_not_found_on_read() {
    let harness = harness_at(monday(), 8, 0);

    assert_matches!(
        harness.service.get_slots_for_date("nobody", tuesday()).await,
        Err(SchedulingError::NotFound(_))
    );
    assert_eq!(harness.store.record_count().await, 0);
}

#[tokio::test]
async fn sunday_and_unavailable_override_are_empty() {
    let harness = seeded_harness().await;
    harness
        .service
        .set_unavailable_dates(DOCTOR, &[tuesday()], "Conference")
        .await
        .unwrap();

    let sunday = harness.service.get_slots_for_date(DOCTOR, d("2026-10-25")).await.unwrap();
    assert!(sunday.slots.is_empty());

    let blocked = harness.service.get_slots_for_date(DOCTOR, tuesday()).await.unwrap();
    assert!(blocked.slots.is_empty());
    assert_eq!(blocked.fee, 500.0);
}

#[tokio::test]
async fn custom_day_replaces_generated_slots() {
    let harness = seeded_harness().await;
    harness
        .service
        .set_custom_day(
            DOCTOR,
            tuesday(),
            vec![
                TimeSlot::new(t("16:00"), t("16:45")),
                TimeSlot::new(t("07:30"), t("08:00")),
            ],
            "Early clinic",
        )
        .await
        .unwrap();

    let day = harness.service.get_slots_for_date(DOCTOR, tuesday()).await.unwrap();
    assert_eq!(starts(&day.slots), vec!["07:30", "16:00"]);
}

#[tokio::test]
async fn custom_day_on_closed_weekday_stays_closed() {
    let harness = seeded_harness().await;
    let sunday = d("2026-10-25");
    harness
        .service
        .set_custom_day(DOCTOR, sunday, vec![TimeSlot::new(t("10:00"), t("10:30"))], "")
        .await
        .unwrap();

    let day = harness.service.get_slots_for_date(DOCTOR, sunday).await.unwrap();
    assert!(day.slots.is_empty());
}

#[tokio::test]
async fn today_only_offers_slots_starting_after_now() {
    let harness = harness_at(monday(), 10, 0);
    harness
        .store
        .save(ConsultationAvailability::with_defaults(DOCTOR))
        .await
        .unwrap();

    let day = harness.service.get_slots_for_date(DOCTOR, monday()).await.unwrap();

    assert_eq!(day.slots[0].start_time, t("10:30"));
    assert_eq!(day.slots.len(), 11);
}

#[tokio::test]
async fn past_date_is_rejected() {
    let harness = seeded_harness().await;

    assert_matches!(
        harness.service.get_slots_for_date(DOCTOR, d("2026-10-18")).await,
        Err(SchedulingError::InvalidRequest(msg)) if msg.contains("past")
    );
}

#[tokio::test]
async fn far_future_date_still_yields_slots() {
    let harness = seeded_harness().await;

    // Well past the stored 30-day advance booking limit.
    let day = harness.service.get_slots_for_date(DOCTOR, d("2026-12-01")).await.unwrap();

    assert_eq!(day.slots.len(), 14);
}

#[tokio::test]
async fn blocking_appointments_remove_their_slot() {
    let harness = seeded_harness().await;
    harness.bookings.book(tuesday(), "10:00", "10:30", AppointmentStatus::Confirmed).await;
    harness.bookings.book(tuesday(), "11:00", "11:30", AppointmentStatus::Pending).await;
    harness.bookings.book(tuesday(), "15:00", "15:30", AppointmentStatus::Cancelled).await;
    harness.bookings.book(tuesday(), "16:00", "16:30", AppointmentStatus::Completed).await;

    let day = harness.service.get_slots_for_date(DOCTOR, tuesday()).await.unwrap();
    let offered = starts(&day.slots);

    assert_eq!(day.slots.len(), 12);
    assert!(!offered.contains(&"10:00".to_string()));
    assert!(!offered.contains(&"11:00".to_string()));
    assert!(offered.contains(&"15:00".to_string()));
    assert!(offered.contains(&"16:00".to_string()));
}

#[tokio::test]
async fn start_and_end_matching_keeps_mismatched_booking_slot() {
    let store = Arc::new(InMemoryAvailabilityStore::new());
    store.save(ConsultationAvailability::with_defaults(DOCTOR)).await.unwrap();
    let bookings = Arc::new(FakeBookings::default());
    bookings.book(tuesday(), "10:00", "11:00", AppointmentStatus::Confirmed).await;

    let clock = Arc::new(FixedClock::at(monday(), 8, 0));
    let service = AvailabilityService::new(store, bookings, clock)
        .with_conflict_match(ConflictMatch::StartAndEnd);

    let day = service.get_slots_for_date(DOCTOR, tuesday()).await.unwrap();
    assert_eq!(day.slots.len(), 14);
}

// ==============================================================================
// RANGE QUERIES
// ==============================================================================

#[tokio::test]
async fn range_omits_empty_days() {
    let harness = seeded_harness().await;
    harness
        .service
        .set_unavailable_dates(DOCTOR, &[d("2026-10-21")], "Leave")
        .await
        .unwrap();

    // Tuesday through next Monday: Wednesday blocked, Sunday closed.
    let days = harness
        .service
        .get_availability_range(DOCTOR, tuesday(), d("2026-10-26"))
        .await
        .unwrap();

    let dates: Vec<NaiveDate> = days.iter().map(|day| day.date).collect();
    assert_eq!(
        dates,
        vec![d("2026-10-20"), d("2026-10-22"), d("2026-10-23"), d("2026-10-24"), d("2026-10-26")]
    );
    assert!(days.iter().all(|day| day.slots.len() == 14 && day.fee == 500.0));
}

#[tokio::test]
async fn range_covers_every_requested_day() {
    let harness = seeded_harness().await;

    let days = harness
        .service
        .get_availability_range(DOCTOR, d("2026-12-01"), d("2026-12-04"))
        .await
        .unwrap();

    let dates: Vec<NaiveDate> = days.iter().map(|day| day.date).collect();
    assert_eq!(dates, vec![d("2026-12-01"), d("2026-12-02"), d("2026-12-03"), d("2026-12-04")]);
}

#[tokio::test]
async fn range_rejects_inverted_or_past_bounds() {
    let harness = seeded_harness().await;

    assert_matches!(
        harness.service.get_availability_range(DOCTOR, d("2026-10-22"), tuesday()).await,
        Err(SchedulingError::InvalidRequest(_))
    );
    assert_matches!(
        harness.service.get_availability_range(DOCTOR, d("2026-10-01"), tuesday()).await,
        Err(SchedulingError::InvalidRequest(_))
    );
}

// ==============================================================================
// STORAGE FAILURES
// ==============================================================================

#[tokio::test]
async fn storage_failure_is_surfaced_not_defaulted() {
    let mut store = MockStore::new();
    store
        .expect_find_by_doctor()
        .returning(|_| Err(SchedulingError::Internal("connection refused".to_string())));
    store.expect_create_if_absent().never();

    let service = AvailabilityService::new(
        Arc::new(store),
        Arc::new(FakeBookings::default()),
        Arc::new(FixedClock::at(monday(), 8, 0)),
    );

    assert_matches!(
        service.get_or_create_availability(DOCTOR).await,
        Err(SchedulingError::Internal(_))
    );
    assert_matches!(
        service.get_slots_for_date(DOCTOR, tuesday()).await,
        Err(SchedulingError::Internal(_))
    );
}

#[tokio::test]
async fn booking_lookup_failure_is_not_treated_as_no_bookings() {
    let mut store = MockStore::new();
    store
        .expect_find_by_doctor()
        .returning(|id| Ok(Some(ConsultationAvailability::with_defaults(id))));

    let mut bookings = MockBookings::new();
    bookings
        .expect_booked_intervals()
        .times(1)
        .returning(|_, _| Err(SchedulingError::Internal("timeout".to_string())));

    let service = AvailabilityService::new(
        Arc::new(store),
        Arc::new(bookings),
        Arc::new(FixedClock::at(monday(), 8, 0)),
    );

    assert_matches!(
        service.get_slots_for_date(DOCTOR, tuesday()).await,
        Err(SchedulingError::Internal(_))
    );
}

#[tokio::test]
async fn closed_day_skips_booking_lookup() {
    let mut store = MockStore::new();
    store
        .expect_find_by_doctor()
        .returning(|id| Ok(Some(ConsultationAvailability::with_defaults(id))));

    let mut bookings = MockBookings::new();
    bookings.expect_booked_intervals().never();

    let service = AvailabilityService::new(
        Arc::new(store),
        Arc::new(bookings),
        Arc::new(FixedClock::at(monday(), 8, 0)),
    );

    let sunday = service.get_slots_for_date(DOCTOR, d("2026-10-25")).await.unwrap();
    assert!(sunday.slots.is_empty());
}
