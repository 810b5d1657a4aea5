//! Fixed test identifiers for deterministic tests.

use uuid::Uuid;

// Meeting IDs (1-99)
pub const TEST_MEETING_1: Uuid = Uuid::from_u128(1);
pub const TEST_MEETING_2: Uuid = Uuid::from_u128(2);
pub const TEST_MEETING_3: Uuid = Uuid::from_u128(3);

// Wallet addresses
pub const ADDRESS_ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const ADDRESS_BOB: &str = "0x2222222222222222222222222222222222222222";
pub const ADDRESS_CAROL: &str = "0x3333333333333333333333333333333333333333";
pub const ADDRESS_DAVE: &str = "0x4444444444444444444444444444444444444444";

// Aliases
pub const ALIAS_BOB: &str = "bob.eth";
