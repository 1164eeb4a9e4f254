// ── Scheduling policy ────────────────────────────────────────────

/// Quota-counted minutes a user may book per week.
pub const WEEKLY_LIMIT_MINUTES: u32 = 90;

/// Local hour at which work hours end (exclusive).
pub const WORK_DAY_END_HOUR: u32 = 18;

/// First bookable slot of the day, local hour.
pub const FIRST_SLOT_HOUR: u32 = 8;

/// Number of half-hour slots per day (08:00 through 21:30).
pub const SLOTS_PER_DAY: usize = 28;

pub const SLOT_MINUTES: u32 = 30;

/// Durations offered for a slot before commit.
pub const DURATION_OPTIONS: [u32; 3] = [30, 45, 60];

/// Default leaderboard size.
pub const LEADERBOARD_SIZE: usize = 5;

// ── Input limits ─────────────────────────────────────────────────

/// One working day. Anything longer is a malformed request, not a booking.
pub const MAX_BOOKING_MINUTES: u32 = 480;

pub const MAX_ID_LEN: usize = 128;
pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_URL_LEN: usize = 2048;
pub const MAX_TAGS: usize = 16;
pub const MAX_TAG_LEN: usize = 64;
pub const MAX_QUIZ_QUESTIONS: usize = 32;

/// Every quiz question carries exactly this many options.
pub const QUIZ_OPTIONS: usize = 4;

/// Widest window accepted by the timezone config (±14h).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
