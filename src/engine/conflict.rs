use crate::model::*;

use super::ledger::BookingLedger;

/// First booking of any user overlapping `span`, skipping `exclude`.
/// Team exclusivity only applies to work-hour candidates; the caller decides.
pub fn find_team_conflict<'a>(
    ledger: &'a BookingLedger,
    span: &Span,
    exclude: Option<&str>,
) -> Option<&'a Booking> {
    ledger
        .overlapping(*span)
        .find(|b| exclude != Some(b.id.as_str()))
}

/// First of the user's own bookings overlapping `span`.
pub fn find_own_conflict<'a>(
    span: &Span,
    own_bookings: impl IntoIterator<Item = &'a Booking>,
) -> Option<&'a Booking> {
    own_bookings
        .into_iter()
        .find(|b| span.overlaps(&b.span()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(h: u32, m: u32) -> Ts {
        Utc.with_ymd_and_hms(2025, 3, 4, h, m, 0).unwrap()
    }

    fn booking(id: &str, user: &str, start: Ts, minutes: u32) -> Booking {
        Booking::new(id.into(), user.into(), "c1".into(), start, minutes)
    }

    #[test]
    fn team_conflict_any_user() {
        let ledger = BookingLedger::from(vec![booking("a", "u1", at(10, 0), 30)]);
        let hit = find_team_conflict(&ledger, &Span::starting_at(at(10, 15), 30), None);
        assert_eq!(hit.map(|b| b.id.as_str()), Some("a"));
    }

    #[test]
    fn team_conflict_touching_is_free() {
        let ledger = BookingLedger::from(vec![booking("a", "u1", at(10, 0), 30)]);
        assert!(find_team_conflict(&ledger, &Span::starting_at(at(10, 30), 30), None).is_none());
        assert!(find_team_conflict(&ledger, &Span::starting_at(at(9, 30), 30), None).is_none());
    }

    #[test]
    fn team_conflict_honors_exclude() {
        let ledger = BookingLedger::from(vec![
            booking("a", "u1", at(10, 0), 30),
            booking("b", "u2", at(10, 30), 30),
        ]);
        let span = Span::starting_at(at(10, 0), 30);
        assert!(find_team_conflict(&ledger, &span, Some("a")).is_none());

        // Excluding one still reports the next overlap
        let wide = Span::starting_at(at(10, 0), 60);
        let hit = find_team_conflict(&ledger, &wide, Some("a"));
        assert_eq!(hit.map(|b| b.id.as_str()), Some("b"));
    }

    #[test]
    fn team_conflict_reports_earliest() {
        let ledger = BookingLedger::from(vec![
            booking("late", "u2", at(10, 30), 30),
            booking("early", "u1", at(9, 45), 30),
        ]);
        let hit = find_team_conflict(&ledger, &Span::starting_at(at(10, 0), 60), None);
        assert_eq!(hit.map(|b| b.id.as_str()), Some("early"));
    }

    #[test]
    fn own_conflict_only_sees_given_bookings() {
        let mine = [booking("m", "u1", at(20, 0), 30)];
        let hit = find_own_conflict(&Span::starting_at(at(20, 15), 30), &mine);
        assert_eq!(hit.map(|b| b.id.as_str()), Some("m"));
        assert!(find_own_conflict(&Span::starting_at(at(20, 30), 30), &mine).is_none());
        assert!(find_own_conflict(&Span::starting_at(at(20, 15), 30), &[]).is_none());
    }
}
