use crate::calendar::Week;
use crate::model::*;

/// Read-side view of all bookings, sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct BookingLedger {
    bookings: Vec<Booking>,
}

impl From<Vec<Booking>> for BookingLedger {
    fn from(mut bookings: Vec<Booking>) -> Self {
        bookings.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Self { bookings }
    }
}

impl BookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Insert booking maintaining sort order by start time.
    pub fn insert(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.start_time <= booking.start_time);
        self.bookings.insert(pos, booking);
    }

    pub fn remove(&mut self, id: &str) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// Bookings whose span overlaps the query window, any user.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: Span) -> impl Iterator<Item = &Booking> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .bookings
            .partition_point(|b| b.start_time < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.end_time > query.start)
    }

    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Booking> {
        self.bookings.iter().filter(move |b| b.user_id == user_id)
    }

    /// A user's bookings whose start falls inside `week`.
    pub fn for_user_in_week<'a>(&'a self, user_id: &'a str, week: Week) -> impl Iterator<Item = &'a Booking> + Clone {
        let lo = self.bookings.partition_point(|b| b.start_time < week.start);
        let hi = self.bookings.partition_point(|b| b.start_time < week.end);
        self.bookings[lo..hi]
            .iter()
            .filter(move |b| b.user_id == user_id)
    }

    /// All bookings starting inside `week`, any user.
    pub fn in_week(&self, week: Week) -> impl Iterator<Item = &Booking> {
        let lo = self.bookings.partition_point(|b| b.start_time < week.start);
        let hi = self.bookings.partition_point(|b| b.start_time < week.end);
        self.bookings[lo..hi].iter()
    }

    pub fn into_vec(self) -> Vec<Booking> {
        self.bookings
    }
}
