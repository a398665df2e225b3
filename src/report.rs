use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::models::{AttendanceTally, Buckets, ClassifiedSession, FeedbackSummary};

const RECENT_PREVIOUS: usize = 5;

fn session_line(session: &ClassifiedSession) -> String {
    format!(
        "{} ({} {} at {}, {}, hosted by {})",
        session.title,
        session.month,
        session.day,
        session.time,
        session.venue,
        session.session_head
    )
}

pub fn build_report(
    generated_at: NaiveDateTime,
    buckets: &Buckets,
    tallies: &HashMap<String, AttendanceTally>,
    feedback: &HashMap<String, FeedbackSummary>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Knowledge Sharing Sessions");
    let _ = writeln!(
        output,
        "Generated at {}",
        generated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Ongoing: {}", buckets.ongoing.len());
    let _ = writeln!(output, "- Upcoming: {}", buckets.upcoming.len());
    let _ = writeln!(output, "- Previous: {}", buckets.previous.len());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Happening Now");
    if buckets.ongoing.is_empty() {
        let _ = writeln!(output, "No sessions are running right now.");
    } else {
        for session in buckets.ongoing.iter() {
            let _ = writeln!(output, "- {}", session_line(session));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Upcoming");
    if buckets.upcoming.is_empty() {
        let _ = writeln!(output, "No upcoming sessions scheduled.");
    } else {
        for session in buckets.upcoming.iter() {
            let tally = tallies.get(&session.id).copied().unwrap_or_default();
            let _ = writeln!(
                output,
                "- {}: {} attending, {} not attending",
                session_line(session),
                tally.attending,
                tally.not_attending
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recently Completed");
    if buckets.previous.is_empty() {
        let _ = writeln!(output, "No completed sessions yet.");
    } else {
        for session in buckets.previous.iter().take(RECENT_PREVIOUS) {
            match feedback.get(&session.id) {
                Some(summary) if summary.count > 0 => {
                    let _ = writeln!(
                        output,
                        "- {}: rated {:.1}/5 across {} responses",
                        session_line(session),
                        summary.average_rating,
                        summary.count
                    );
                }
                _ => {
                    let _ = writeln!(output, "- {}: no feedback yet", session_line(session));
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::models::Session;
    use chrono::NaiveDate;

    #[test]
    fn report_lists_tallies_and_ratings() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 6, d).expect("valid date");
        let mut upcoming = Session::new("up", day(20));
        upcoming.title = Some("Mock interviews".to_string());
        upcoming.time = Some("10:00".to_string());
        let mut done = Session::new("done", day(2));
        done.title = Some("Resume review".to_string());

        let now = day(10).and_hms_opt(9, 0, 0).expect("valid time");
        let buckets = classify(&[upcoming, done], now);

        let tallies = HashMap::from([(
            "up".to_string(),
            AttendanceTally {
                attending: 12,
                not_attending: 3,
            },
        )]);
        let feedback = HashMap::from([(
            "done".to_string(),
            FeedbackSummary {
                count: 4,
                average_rating: 4.4,
            },
        )]);

        let report = build_report(now, &buckets, &tallies, &feedback);
        assert!(report.contains("- Upcoming: 1"));
        assert!(report.contains(
            "Mock interviews (Jun 20 at 10:00, TBA, hosted by TBA): 12 attending, 3 not attending"
        ));
        assert!(report.contains(
            "Resume review (Jun 2 at 00:00, TBA, hosted by TBA): rated 4.4/5 across 4 responses"
        ));
        assert!(report.contains("No sessions are running right now."));
    }
}
