//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When fixture data changes (tags, requester names, etc.), update only
//! this file.

// ============================================================================
// Requester
// ============================================================================

/// Header the test server reads the requester's display name from
pub const REQUESTER_HEADER: &str = "x-user-name";

/// Display name sent by "logged in" test clients
pub const TEST_USER_NAME: &str = "dj_kate";

// ============================================================================
// Fixture Tags
// ============================================================================

pub const FIXTURE_ARTIST: &str = "The Test Band";
pub const FIXTURE_TITLE: &str = "Opening Track";
pub const FIXTURE_ALBUM: &str = "First Album";
pub const FIXTURE_GENRE: &str = "Rock";
pub const FIXTURE_LENGTH: &str = "215000";

/// Fake PNG payload embedded as APIC in tagged fixtures
pub const FIXTURE_ARTWORK: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

/// Artist tag the fake engine may stamp on merged output
pub const MERGED_ARTIST: &str = "Merge Bot";

// ============================================================================
// Server Settings
// ============================================================================

pub const PLACEHOLDER_COVER_URL: &str = "http://localhost:3000/assets/img/covers/cover.svg";

/// Largest accepted upload in the test server
pub const TEST_MAX_UPLOAD_SIZE: u64 = 256 * 1024;

// ============================================================================
// Timeouts
// ============================================================================

/// Server ready timeout in milliseconds
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Server ready poll interval in milliseconds
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// How long to wait for fire-and-forget artwork writes
pub const ARTWORK_WAIT_TIMEOUT_MS: u64 = 2000;
