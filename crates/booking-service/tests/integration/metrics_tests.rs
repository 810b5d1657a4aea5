//! Integration tests for allocator metrics
//!
//! Each test drives the allocator on a current-thread runtime under a
//! thread-local `DebuggingRecorder`, so recorders never leak between tests.

use booking_service::crypto;
use booking_service::errors::BookingError;
use booking_test_utils::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::future::Future;

/// Run `future` to completion with a fresh debugging recorder installed for
/// the current thread.
fn recorded<F: Future>(future: F) -> (F::Output, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let output = metrics::with_local_recorder(&recorder, || runtime.block_on(future));
    (output, snapshotter)
}

/// Total of the counters named `name` whose labels include every pair in
/// `labels`.
fn counter(snapshotter: &Snapshotter, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| {
            let key = key.key();
            key.name() == name
                && labels
                    .iter()
                    .all(|(k, v)| key.labels().any(|l| l.key() == *k && l.value() == *v))
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(n) => n,
            _ => 0,
        })
        .sum()
}

async fn setup(booking: &TestBooking) -> Result<(), BookingError> {
    booking.onboard(ADDRESS_ALICE).await?;
    booking
        .onboard_owner(ADDRESS_BOB, monday_office_hours())
        .await?;
    booking.onboard(ADDRESS_CAROL).await?;
    Ok(())
}

#[test]
fn test_overlap_counts_precheck_conflict_and_failed_phase() {
    let booking = TestBooking::new();

    let (result, snapshotter) = recorded(async {
        setup(&booking).await?;

        let first = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build();
        booking.allocator.create_meeting_at(first, test_now()).await?;

        let clash = MeetingRequestBuilder::new(monday_at(10, 15), monday_at(10, 45))
            .scheduler(ADDRESS_CAROL)
            .owner(ADDRESS_BOB)
            .build();
        booking.allocator.create_meeting_at(clash, test_now()).await
    });

    assert!(matches!(result, Err(BookingError::TimeNotAvailable)));
    assert_eq!(
        counter(&snapshotter, "booking_slot_conflicts_total", &[("source", "precheck")]),
        1
    );
    assert_eq!(
        counter(&snapshotter, "booking_slot_conflicts_total", &[("source", "availability")]),
        0
    );
    assert_eq!(
        counter(
            &snapshotter,
            "booking_meeting_creations_total",
            &[("status", "error"), ("phase", "conflict_checking")]
        ),
        1
    );
    assert_eq!(
        counter(
            &snapshotter,
            "booking_meeting_creations_total",
            &[("status", "success"), ("phase", "done")]
        ),
        1
    );
}

#[test]
fn test_outside_availability_counts_availability_conflict() {
    let booking = TestBooking::new();

    let (result, snapshotter) = recorded(async {
        setup(&booking).await?;

        let late = MeetingRequestBuilder::new(monday_at(17, 0), monday_at(18, 0))
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build();
        booking.allocator.create_meeting_at(late, test_now()).await
    });

    assert!(matches!(result, Err(BookingError::TimeNotAvailable)));
    assert_eq!(
        counter(&snapshotter, "booking_slot_conflicts_total", &[("source", "availability")]),
        1
    );
}

#[test]
fn test_storage_failure_counts_persisting_phase() {
    let booking =
        TestBooking::with_stores(MemorySlotStore::new().with_insert_failure_after(1), true);

    let (result, snapshotter) = recorded(async {
        setup(&booking).await?;

        let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
            .meeting_id(TEST_MEETING_1)
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build();
        booking.allocator.create_meeting_at(request, test_now()).await
    });

    assert!(matches!(result, Err(BookingError::Database(_))));
    assert_eq!(
        counter(
            &snapshotter,
            "booking_meeting_creations_total",
            &[("status", "error"), ("phase", "persisting")]
        ),
        1
    );
    assert_eq!(
        counter(&snapshotter, "booking_meeting_creations_total", &[("status", "success")]),
        0
    );
}

#[test]
fn test_wrong_signature_counts_crypto_failure() {
    let booking = TestBooking::new();

    let (result, snapshotter) = recorded(async {
        let alice = booking.onboard(ADDRESS_ALICE).await?;
        crypto::unseal_private_key(&alice.sealed_private_key, &signature_for(ADDRESS_BOB))
    });

    assert!(matches!(result, Err(BookingError::Decryption)));
    assert_eq!(
        counter(&snapshotter, "booking_crypto_failures_total", &[("operation", "unseal")]),
        1
    );
}
