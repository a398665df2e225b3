use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};

use crate::models::{
    Bucket, Buckets, ClassifiedSession, Session, DEFAULT_DESCRIPTION, DEFAULT_TITLE, TBA,
};

/// Sessions carry no end time; they are assumed to run this long.
pub const DEFAULT_SESSION_DURATION_MINUTES: i64 = 120;

/// Upper bound on a configured session length (one week).
pub const MAX_SESSION_DURATION_MINUTES: i64 = 7 * 24 * 60;

const DEFAULT_TIME: &str = "00:00";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    duration: Duration,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_duration_minutes(DEFAULT_SESSION_DURATION_MINUTES)
    }
}

impl Classifier {
    /// Lengths outside `0..=MAX_SESSION_DURATION_MINUTES` are clamped.
    pub fn with_duration_minutes(minutes: i64) -> Self {
        let minutes = minutes.clamp(0, MAX_SESSION_DURATION_MINUTES);
        Self {
            duration: Duration::try_minutes(minutes).unwrap_or_else(Duration::zero),
        }
    }

    pub fn classify(&self, sessions: &[Session], now: NaiveDateTime) -> Buckets {
        let mut buckets = Buckets::default();

        for session in sessions {
            if session.status.is_hidden() {
                continue;
            }

            let starts_at = session_start(session);
            let bucket = self.bucket_for(session, starts_at, now);
            let classified = to_classified(session, starts_at, bucket);

            match bucket {
                Bucket::Ongoing => buckets.ongoing.push(classified),
                Bucket::Upcoming => buckets.upcoming.push(classified),
                Bucket::Previous => buckets.previous.push(classified),
            }
        }

        buckets.upcoming.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        buckets.previous.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        buckets
    }

    pub fn bucket_for(
        &self,
        session: &Session,
        starts_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Bucket {
        if session.manually_completed {
            return Bucket::Previous;
        }

        // Sessions at the very end of the calendar never finish.
        let ends_at = starts_at
            .checked_add_signed(self.duration)
            .unwrap_or(NaiveDateTime::MAX);
        let same_day = starts_at.date() == now.date();

        if same_day {
            if now >= starts_at && now <= ends_at {
                Bucket::Ongoing
            } else if now < starts_at {
                Bucket::Upcoming
            } else {
                Bucket::Previous
            }
        } else if starts_at > now {
            Bucket::Upcoming
        } else {
            Bucket::Previous
        }
    }
}

/// Classify with the default two hour session length.
pub fn classify(sessions: &[Session], now: NaiveDateTime) -> Buckets {
    Classifier::default().classify(sessions, now)
}

pub fn session_start(session: &Session) -> NaiveDateTime {
    let raw = session.time.as_deref().unwrap_or(DEFAULT_TIME);
    let time = parse_clock(raw).unwrap_or_else(|| {
        log::debug!(
            "session {} has unusable time '{}', assuming midnight",
            session.id,
            raw
        );
        NaiveTime::MIN
    });
    session.date.and_time(time)
}

/// Strict 24-hour `H:MM` / `HH:MM`; anything else is rejected.
fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !(1..=2).contains(&hours.len()) || minutes.len() != 2 {
        return None;
    }
    if !all_digits(hours) || !all_digits(minutes) {
        return None;
    }
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}

fn to_classified(session: &Session, starts_at: NaiveDateTime, bucket: Bucket) -> ClassifiedSession {
    ClassifiedSession {
        id: session.id.clone(),
        title: non_blank(&session.title).unwrap_or(DEFAULT_TITLE).to_string(),
        description: non_blank(&session.description)
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string(),
        date: session.date,
        time: session.time.clone().unwrap_or_else(|| DEFAULT_TIME.to_string()),
        venue: non_blank(&session.venue).unwrap_or(TBA).to_string(),
        session_head: non_blank(&session.session_head).unwrap_or(TBA).to_string(),
        status: session.status.clone(),
        manually_completed: session.manually_completed,
        target_audience: session.target_audience.clone(),
        target_departments: session.target_departments.clone(),
        department: session.department.clone(),
        bucket,
        month: MONTHS[session.date.month0() as usize].to_string(),
        day: session.date.day(),
        starts_at,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}
