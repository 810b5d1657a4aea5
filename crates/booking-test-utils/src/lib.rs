//! # Booking Test Utilities
//!
//! Shared test utilities for the booking service.
//!
//! This crate provides:
//! - In-memory account, content and slot stores (`memory_stores`)
//! - Services and routers wired over those stores (`harness`)
//! - Deterministic fixtures: signatures, preferences, instants (`fixtures`)
//! - Fixed test IDs and addresses (`test_ids`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booking_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let booking = TestBooking::new();
//!     booking.onboard_owner(ADDRESS_BOB, monday_office_hours()).await?;
//!     booking.onboard(ADDRESS_ALICE).await?;
//!
//!     let request = MeetingRequestBuilder::new(monday_at(10, 0), monday_at(11, 0))
//!         .scheduler(ADDRESS_ALICE)
//!         .owner(ADDRESS_BOB)
//!         .build();
//!     booking.allocator.create_meeting_at(request, test_now()).await?;
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod memory_stores;
pub mod test_ids;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
pub use memory_stores::*;
pub use test_ids::*;
