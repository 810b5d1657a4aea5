//! Integration tests for meeting allocation
//!
//! Drives `SlotAllocator` over the in-memory stores with a fixed "now"
//! (Tuesday 2030-01-01) and meetings on the following Monday.

use booking_service::crypto;
use booking_service::errors::BookingError;
use booking_service::models::{ParticipantRole, ParticipantStatus};
use booking_test_utils::*;
use chrono::Duration;
use std::collections::HashSet;

/// Alice schedules, Bob owns with Monday office hours, Carol is onboarded
/// without preferences.
async fn setup(booking: &TestBooking) -> Result<(), anyhow::Error> {
    booking.onboard(ADDRESS_ALICE).await?;
    booking
        .onboard_owner(ADDRESS_BOB, monday_office_hours())
        .await?;
    booking.onboard(ADDRESS_CAROL).await?;
    Ok(())
}

// ============================================================================
// Core scenarios
// ============================================================================

/// Owner available 09:00-17:00; a 10:00-10:30 request succeeds with one slot
/// per participant.
#[tokio::test]
async fn test_create_meeting_within_availability() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(10, 30))
        .meeting_id(TEST_MEETING_1)
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();

    let scheduled = booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    let alice = booking.account(ADDRESS_ALICE).await?;
    assert_eq!(scheduled.meeting_id, TEST_MEETING_1);
    assert_eq!(scheduled.start, monday_at(10, 0));
    assert_eq!(scheduled.end, monday_at(10, 30));
    assert_eq!(
        scheduled.owner_public_key, alice.public_key,
        "Confirmation should be the scheduler's slot"
    );

    let slots = booking.slots.for_meeting(TEST_MEETING_1);
    assert_eq!(slots.len(), 2);
    let roles: HashSet<ParticipantRole> = slots.iter().map(|s| s.role).collect();
    assert_eq!(
        roles,
        HashSet::from([ParticipantRole::Scheduler, ParticipantRole::Owner])
    );
    assert!(booking.content.contains(&scheduled.content_address));

    Ok(())
}

/// An owner with a slot at 10:00-10:30 cannot be booked at 10:15-10:45.
#[tokio::test]
async fn test_overlapping_request_is_rejected() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let first = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(10, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    booking.allocator.create_meeting_at(first, test_now()).await?;

    let second = MeetingRequestBuilder::new(monday_at(10, 15), monday_at(10, 45))
        .scheduler(ADDRESS_CAROL)
        .owner(ADDRESS_BOB)
        .build();
    let result = booking.allocator.create_meeting_at(second, test_now()).await;

    assert!(
        matches!(result, Err(BookingError::TimeNotAvailable)),
        "Expected TimeNotAvailable, got {:?}",
        result
    );
    assert_eq!(booking.slots.all().len(), 2, "No slots from the rejected request");

    Ok(())
}

/// A back-to-back meeting sharing only an endpoint does not conflict.
#[tokio::test]
async fn test_adjacent_meetings_do_not_conflict() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    for (start, end) in [(10, 11), (11, 12)] {
        let request = MeetingRequestBuilder::new(monday_at(start, 0), monday_at(end, 0))
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build();
        booking
            .allocator
            .create_meeting_at(request, test_now())
            .await?;
    }

    assert_eq!(booking.slots.all().len(), 4);
    Ok(())
}

/// Scheduling with yourself as the sole owner is rejected, whatever
/// identifier is used for each side.
#[tokio::test]
async fn test_meeting_with_yourself() -> Result<(), anyhow::Error> {
    let booking = TestBooking::without_availability_checks();
    setup(&booking).await?;
    let alice = booking.account(ADDRESS_ALICE).await?;

    for owner_identifier in [ADDRESS_ALICE.to_string(), alice.public_key.clone()] {
        let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(10, 30))
            .scheduler(ADDRESS_ALICE)
            .owner(&owner_identifier)
            .build();
        let result = booking.allocator.create_meeting_at(request, test_now()).await;

        assert!(
            matches!(result, Err(BookingError::MeetingWithYourself)),
            "Expected MeetingWithYourself, got {:?}",
            result
        );
    }

    assert!(booking.slots.all().is_empty());
    assert_eq!(booking.content.put_count(), 1, "Only Bob's preferences were written");

    Ok(())
}

/// Three participants produce three slots with distinct envelopes that all
/// decrypt to the same payload.
#[tokio::test]
async fn test_three_participants_share_one_payload() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(14, 0), monday_at(15, 0))
        .meeting_id(TEST_MEETING_2)
        .title("Quarterly review")
        .content("Agenda: numbers")
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_CAROL)
        .build();
    booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    let slots = booking.slots.for_meeting(TEST_MEETING_2);
    assert_eq!(slots.len(), 3);

    let addresses: HashSet<&str> = slots.iter().map(|s| s.content_address.as_str()).collect();
    assert_eq!(addresses.len(), 3, "Each participant gets their own envelope");

    let mut payloads = Vec::new();
    for address in [ADDRESS_ALICE, ADDRESS_BOB, ADDRESS_CAROL] {
        let account = booking.account(address).await?;
        let slot = slots
            .iter()
            .find(|s| s.owner_public_key == account.public_key)
            .expect("slot for participant");
        let stored = booking.allocator.get_slot(slot.id).await?;
        payloads.push(booking.allocator.open_meeting(
            &account,
            &signature_for(address),
            &stored.envelope,
        )?);
    }

    assert!(payloads.windows(2).all(|w| w[0] == w[1]));

    let payload = &payloads[0];
    assert_eq!(payload.meeting_id, TEST_MEETING_2);
    assert_eq!(payload.title.as_deref(), Some("Quarterly review"));
    assert_eq!(payload.content, "Agenda: numbers");
    assert_eq!(payload.created_at, test_now());
    assert!(payload
        .meeting_url
        .starts_with(&format!("{}/", TEST_MEETING_URL_BASE)));
    assert!(payload.changes.is_empty());

    let statuses: Vec<(ParticipantRole, ParticipantStatus)> = payload
        .participants
        .iter()
        .map(|p| (p.role, p.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (ParticipantRole::Scheduler, ParticipantStatus::Accepted),
            (ParticipantRole::Owner, ParticipantStatus::Accepted),
            (ParticipantRole::Guest, ParticipantStatus::Pending),
        ]
    );

    Ok(())
}

// ============================================================================
// Decryption
// ============================================================================

/// A wrong signature never yields a key.
#[tokio::test]
async fn test_unseal_with_wrong_signature_fails() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    let alice = booking.onboard(ADDRESS_ALICE).await?;

    let result = crypto::unseal_private_key(
        &alice.sealed_private_key,
        &signature_for(ADDRESS_BOB),
    );
    assert!(matches!(result, Err(BookingError::Decryption)));

    Ok(())
}

#[tokio::test]
async fn test_open_meeting_rejects_wrong_signature_and_foreign_envelope(
) -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(9, 0), monday_at(9, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    let scheduled = booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    let alice = booking.account(ADDRESS_ALICE).await?;
    let bob = booking.account(ADDRESS_BOB).await?;

    let wrong_signature = booking.allocator.open_meeting(
        &alice,
        &signature_for(ADDRESS_CAROL),
        &scheduled.envelope,
    );
    assert!(matches!(wrong_signature, Err(BookingError::Decryption)));

    let foreign = booking.allocator.open_meeting(
        &bob,
        &signature_for(ADDRESS_BOB),
        &scheduled.envelope,
    );
    assert!(matches!(foreign, Err(BookingError::Decryption)));

    let own = booking
        .allocator
        .open_meeting(&alice, &signature_for(ADDRESS_ALICE), &scheduled.envelope)?;
    assert_eq!(own.start, monday_at(9, 0));

    Ok(())
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_unknown_participant_is_rejected_before_any_write() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(10, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_DAVE)
        .build();
    let result = booking.allocator.create_meeting_at(request, test_now()).await;

    assert!(matches!(result, Err(BookingError::AccountNotFound(_))));
    assert!(booking.slots.all().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_are_bad_requests() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let inverted = MeetingRequestBuilder::new(monday_at(11, 0), monday_at(10, 0))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    let no_scheduler = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_ALICE)
        .build();
    let two_schedulers = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_ALICE)
        .scheduler(ADDRESS_CAROL)
        .owner(ADDRESS_BOB)
        .build();
    let no_owner = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_ALICE)
        .guest(ADDRESS_CAROL)
        .build();
    let duplicate = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_BOB)
        .build();

    for request in [inverted, no_scheduler, two_schedulers, no_owner, duplicate] {
        let result = booking.allocator.create_meeting_at(request, test_now()).await;
        assert!(
            matches!(result, Err(BookingError::BadRequest(_))),
            "Expected BadRequest, got {:?}",
            result
        );
    }

    assert!(booking.slots.all().is_empty());
    Ok(())
}

// ============================================================================
// Conflict rules
// ============================================================================

/// An owner's own scheduler and guest slots count against new bookings.
#[tokio::test]
async fn test_owner_busy_in_any_role_is_rejected() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;
    booking
        .onboard_owner(ADDRESS_DAVE, monday_office_hours())
        .await?;

    // Bob schedules a meeting with Alice, then is invited as a guest by Dave.
    let scheduled_by_bob = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_BOB)
        .owner(ADDRESS_DAVE)
        .build();
    let bob_as_guest = MeetingRequestBuilder::new(monday_at(14, 0), monday_at(15, 0))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_DAVE)
        .guest(ADDRESS_BOB)
        .build();
    booking
        .allocator
        .create_meeting_at(scheduled_by_bob, test_now())
        .await?;
    booking
        .allocator
        .create_meeting_at(bob_as_guest, test_now())
        .await?;
    let stored = booking.slots.all().len();

    for (start, end) in [
        (monday_at(10, 15), monday_at(10, 45)),
        (monday_at(14, 30), monday_at(15, 30)),
    ] {
        let request = MeetingRequestBuilder::new(start, end)
            .scheduler(ADDRESS_CAROL)
            .owner(ADDRESS_BOB)
            .build();
        let result = booking.allocator.create_meeting_at(request, test_now()).await;
        assert!(
            matches!(result, Err(BookingError::TimeNotAvailable)),
            "Expected TimeNotAvailable at {}, got {:?}",
            start,
            result
        );
    }
    assert_eq!(booking.slots.all().len(), stored);

    // Neither busy period is offered either.
    let starts = booking
        .account_service
        .available_starts_at(ADDRESS_BOB, monday_at(0, 0).date_naive(), 30, test_now())
        .await?;
    for taken in [monday_at(10, 0), monday_at(10, 30), monday_at(14, 0)] {
        assert!(!starts.contains(&taken), "{} should not be offered", taken);
    }
    assert!(starts.contains(&monday_at(11, 0)));

    Ok(())
}

/// Guest calendars are not conflict-checked.
#[tokio::test]
async fn test_guest_may_be_double_booked() -> Result<(), anyhow::Error> {
    let booking = TestBooking::without_availability_checks();
    setup(&booking).await?;
    booking.onboard(ADDRESS_DAVE).await?;

    let first = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_CAROL)
        .build();
    let second = MeetingRequestBuilder::new(monday_at(10, 30), monday_at(11, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_DAVE)
        .guest(ADDRESS_CAROL)
        .build();

    booking.allocator.create_meeting_at(first, test_now()).await?;
    booking.allocator.create_meeting_at(second, test_now()).await?;

    let carol = booking.account(ADDRESS_CAROL).await?;
    let carol_slots = booking
        .account_service
        .busy_slots(ADDRESS_CAROL, monday_at(0, 0), monday_at(23, 0))
        .await?;
    assert_eq!(carol_slots.len(), 2);
    assert!(carol_slots
        .iter()
        .all(|s| s.owner_public_key == carol.public_key && s.role == ParticipantRole::Guest));

    Ok(())
}

#[tokio::test]
async fn test_request_outside_availability_is_rejected() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    // Ends after 17:00.
    let late = MeetingRequestBuilder::new(monday_at(16, 30), monday_at(17, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    // Carol has published nothing.
    let no_preferences = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(10, 30))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_CAROL)
        .build();

    for request in [late, no_preferences] {
        let result = booking.allocator.create_meeting_at(request, test_now()).await;
        assert!(
            matches!(result, Err(BookingError::TimeNotAvailable)),
            "Expected TimeNotAvailable, got {:?}",
            result
        );
    }
    assert!(booking.slots.all().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_availability_not_enforced_when_disabled() -> Result<(), anyhow::Error> {
    let booking = TestBooking::without_availability_checks();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(20, 0), monday_at(21, 0))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_CAROL)
        .build();
    booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    assert_eq!(booking.slots.all().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_min_notice_and_blocked_intervals() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    booking.onboard(ADDRESS_ALICE).await?;

    let mut preferences = monday_office_hours();
    preferences.min_notice_minutes = 60;
    preferences.blocked = vec![booking_service::availability::BlockedInterval::new(
        monday_at(13, 0),
        monday_at(14, 0),
    )];
    booking.onboard_owner(ADDRESS_BOB, preferences).await?;

    let now = monday_at(9, 30);
    let request = |start, end| {
        MeetingRequestBuilder::new(start, end)
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build()
    };

    let too_soon = booking
        .allocator
        .create_meeting_at(request(monday_at(10, 0), monday_at(10, 30)), now)
        .await;
    assert!(matches!(too_soon, Err(BookingError::TimeNotAvailable)));

    let blocked = booking
        .allocator
        .create_meeting_at(request(monday_at(13, 30), monday_at(14, 30)), now)
        .await;
    assert!(matches!(blocked, Err(BookingError::TimeNotAvailable)));

    booking
        .allocator
        .create_meeting_at(request(monday_at(10, 30), monday_at(11, 0)), now)
        .await?;

    Ok(())
}

/// Bookings are limited to the lengths the owner offers.
#[tokio::test]
async fn test_unoffered_duration_is_rejected() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    booking.onboard(ADDRESS_ALICE).await?;

    let mut preferences = monday_office_hours();
    preferences.meeting_durations = vec![30, 60];
    booking.onboard_owner(ADDRESS_BOB, preferences).await?;

    let request = |start, end| {
        MeetingRequestBuilder::new(start, end)
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build()
    };

    let unoffered = booking
        .allocator
        .create_meeting_at(request(monday_at(10, 0), monday_at(10, 45)), test_now())
        .await;
    assert!(matches!(unoffered, Err(BookingError::TimeNotAvailable)));
    assert!(booking.slots.all().is_empty());

    booking
        .allocator
        .create_meeting_at(request(monday_at(10, 0), monday_at(11, 0)), test_now())
        .await?;

    Ok(())
}

// ============================================================================
// Retry and cancellation
// ============================================================================

/// Re-submitting a successful request with the same meeting id returns the
/// stored slot and writes nothing new.
#[tokio::test]
async fn test_retry_with_same_meeting_id_is_idempotent() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .meeting_id(TEST_MEETING_1)
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();

    let first = booking
        .allocator
        .create_meeting_at(request.clone(), test_now())
        .await?;
    let second = booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    assert_eq!(first.id, second.id);
    assert_eq!(first.content_address, second.content_address);
    assert_eq!(booking.slots.all().len(), 2);

    Ok(())
}

/// A failure part-way through persisting leaves some slots behind; a retry
/// with the same meeting id completes the meeting.
#[tokio::test]
async fn test_retry_completes_partially_persisted_meeting() -> Result<(), anyhow::Error> {
    let booking =
        TestBooking::with_stores(MemorySlotStore::new().with_insert_failure_after(1), true);
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .meeting_id(TEST_MEETING_3)
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_CAROL)
        .build();

    let failed = booking
        .allocator
        .create_meeting_at(request.clone(), test_now())
        .await;
    assert!(matches!(failed, Err(BookingError::Database(_))));

    let partial = booking.slots.for_meeting(TEST_MEETING_3);
    assert_eq!(partial.len(), 1, "Scheduler slot was written before the failure");

    // The retry happens later; the meeting keeps its first creation time.
    booking.slots.clear_insert_failure();
    let retried_at = test_now() + Duration::hours(1);
    let scheduled = booking
        .allocator
        .create_meeting_at(request, retried_at)
        .await?;

    let slots = booking.slots.for_meeting(TEST_MEETING_3);
    assert_eq!(slots.len(), 3);
    assert_eq!(scheduled.id, partial[0].id);
    assert_eq!(scheduled.content_address, partial[0].content_address);

    // Envelopes written by either attempt open to the same payload.
    let mut payloads = Vec::new();
    for address in [ADDRESS_ALICE, ADDRESS_BOB, ADDRESS_CAROL] {
        let account = booking.account(address).await?;
        let slot = slots
            .iter()
            .find(|s| s.owner_public_key == account.public_key)
            .expect("slot for participant");
        let stored = booking.allocator.get_slot(slot.id).await?;
        payloads.push(booking.allocator.open_meeting(
            &account,
            &signature_for(address),
            &stored.envelope,
        )?);
    }
    assert!(
        payloads.windows(2).all(|w| w[0] == w[1]),
        "Participants disagree about the meeting: {:?}",
        payloads
    );
    assert_eq!(payloads[0].meeting_id, TEST_MEETING_3);
    assert_eq!(payloads[0].created_at, test_now());
    assert!(slots.iter().all(|s| s.created_at == test_now()));

    Ok(())
}

/// A retry cannot move a meeting that already has slots.
#[tokio::test]
async fn test_retry_with_different_time_is_rejected() -> Result<(), anyhow::Error> {
    let booking =
        TestBooking::with_stores(MemorySlotStore::new().with_insert_failure_after(1), true);
    setup(&booking).await?;

    let request = |start, end| {
        MeetingRequestBuilder::new(start, end)
            .meeting_id(TEST_MEETING_3)
            .scheduler(ADDRESS_ALICE)
            .owner(ADDRESS_BOB)
            .build()
    };

    let failed = booking
        .allocator
        .create_meeting_at(request(monday_at(10, 0), monday_at(11, 0)), test_now())
        .await;
    assert!(matches!(failed, Err(BookingError::Database(_))));

    booking.slots.clear_insert_failure();
    let moved = booking
        .allocator
        .create_meeting_at(request(monday_at(12, 0), monday_at(13, 0)), test_now())
        .await;
    assert!(
        matches!(moved, Err(BookingError::BadRequest(_))),
        "Expected BadRequest, got {:?}",
        moved
    );

    let slots = booking.slots.for_meeting(TEST_MEETING_3);
    assert_eq!(slots.len(), 1);
    assert!(slots
        .iter()
        .all(|s| s.start == monday_at(10, 0) && s.end == monday_at(11, 0)));

    Ok(())
}

/// The join URL depends only on the meeting id.
#[tokio::test]
async fn test_rebooked_meeting_keeps_its_room() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .meeting_id(TEST_MEETING_1)
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    let alice = booking.account(ADDRESS_ALICE).await?;

    let first = booking
        .allocator
        .create_meeting_at(request.clone(), test_now())
        .await?;
    let first_url = booking
        .allocator
        .open_meeting(&alice, &signature_for(ADDRESS_ALICE), &first.envelope)?
        .meeting_url;

    booking.allocator.cancel_meeting(TEST_MEETING_1).await?;
    let second = booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;
    let second_url = booking
        .allocator
        .open_meeting(&alice, &signature_for(ADDRESS_ALICE), &second.envelope)?
        .meeting_url;

    assert_eq!(first_url, second_url);

    Ok(())
}

#[tokio::test]
async fn test_cancel_meeting_frees_the_owner() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .meeting_id(TEST_MEETING_1)
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .guest(ADDRESS_CAROL)
        .build();
    let scheduled = booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    assert_eq!(booking.allocator.cancel_meeting(TEST_MEETING_1).await?, 3);
    assert!(booking.slots.all().is_empty());
    assert!(
        booking.content.contains(&scheduled.content_address),
        "Envelopes outlive their slots"
    );

    let again = booking.allocator.cancel_meeting(TEST_MEETING_1).await;
    assert!(matches!(again, Err(BookingError::NotFound(_))));

    let missing = booking.allocator.get_slot(scheduled.id).await;
    assert!(matches!(missing, Err(BookingError::NotFound(_))));

    let rebook = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
        .scheduler(ADDRESS_CAROL)
        .owner(ADDRESS_BOB)
        .build();
    booking
        .allocator
        .create_meeting_at(rebook, test_now())
        .await?;

    Ok(())
}

/// Longer meetings still respect the owner's range end.
#[tokio::test]
async fn test_full_day_meeting_fits_exactly() -> Result<(), anyhow::Error> {
    let booking = TestBooking::new();
    setup(&booking).await?;

    let start = monday_at(9, 0);
    let request = MeetingRequestBuilder::new(start, start + Duration::hours(8))
        .scheduler(ADDRESS_ALICE)
        .owner(ADDRESS_BOB)
        .build();
    booking
        .allocator
        .create_meeting_at(request, test_now())
        .await?;

    Ok(())
}
