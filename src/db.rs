use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::{PortalError, PortalResult};
use crate::ingest::ImportedSession;
use crate::models::{
    normalize_audience, normalize_departments, AttendanceResponse, AttendanceTally,
    FeedbackRecord, FeedbackSummary, Session, SessionStatus,
};
use crate::workflow::ValidFeedback;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl SeedCounts {
    /// `fresh` is Postgres' `xmax = 0` for the upserted row.
    pub fn record(&mut self, fresh: bool) {
        if fresh {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }
}

/// Sample sessions spread around `today` so every bucket has something in it.
pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<SeedCounts> {
    let sessions = vec![
        (
            "seed-001",
            "Cracking product company interviews",
            "Alumni panel on DSA rounds and system design basics",
            today + Duration::days(3),
            Some("16:00"),
            "Seminar Hall 1",
            "Priya Nair (CSE 2019)",
            "upcoming",
            vec!["E-3", "E-4"],
            vec!["CSE", "ECE"],
        ),
        (
            "seed-002",
            "Core jobs in power systems",
            "Life at a grid operator and how to prepare for PSU exams",
            today,
            Some("10:00"),
            "EEE Block Room 204",
            "Ravi Teja (EEE 2016)",
            "upcoming",
            vec!["all"],
            vec!["EEE"],
        ),
        (
            "seed-003",
            "Higher studies abroad: SOP workshop",
            "Writing statements of purpose that get read",
            today - Duration::days(6),
            Some("14:30"),
            "Library Auditorium",
            "Dr. Meera Iyer",
            "completed",
            vec!["E-4"],
            vec!["ALL"],
        ),
        (
            "seed-004",
            "Open source for beginners",
            "First contributions, picking issues, and getting reviewed",
            today + Duration::days(10),
            None,
            "Online",
            "Arjun Rao (CSE 2021)",
            "upcoming",
            vec!["E1", "E-2"],
            vec!["ALL"],
        ),
        (
            "seed-005",
            "Site engineering internships",
            "Cancelled after the speaker's travel fell through",
            today + Duration::days(1),
            Some("11:00"),
            "Civil Seminar Room",
            "Kavya Reddy (CIVIL 2018)",
            "cancelled",
            vec!["E-3"],
            vec!["CIVIL"],
        ),
    ];

    let mut counts = SeedCounts::default();
    for (source_key, title, description, date, time, venue, head, status, audience, depts) in
        sessions
    {
        let row = sqlx::query(
            r#"
            INSERT INTO alumni_portal.sessions
            (id, source_key, title, description, session_date, session_time, venue,
             session_head, status, target_audience, target_departments)
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO UPDATE
            SET session_date = EXCLUDED.session_date, status = EXCLUDED.status,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(source_key)
        .bind(title)
        .bind(description)
        .bind(date)
        .bind(time)
        .bind(venue)
        .bind(head)
        .bind(status)
        .bind(&audience)
        .bind(&depts)
        .fetch_one(pool)
        .await?;
        counts.record(row.get("inserted"));
    }

    Ok(counts)
}

pub async fn import_sessions(
    pool: &PgPool,
    sessions: &[ImportedSession],
) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for imported in sessions {
        let session = &imported.session;
        let audience: Vec<String> = session
            .target_audience
            .iter()
            .map(|a| a.to_string())
            .collect();
        let departments: Vec<String> = session
            .target_departments
            .iter()
            .map(|d| d.to_string())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO alumni_portal.sessions
            (id, source_key, title, description, session_date, session_time, venue,
             session_head, status, manually_completed, target_audience, target_departments,
             department)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(&session.id)
        .bind(&imported.source_key)
        .bind(&session.title)
        .bind(&session.description)
        .bind(session.date)
        .bind(&session.time)
        .bind(&session.venue)
        .bind(&session.session_head)
        .bind(session.status.as_str())
        .bind(session.manually_completed)
        .bind(&audience)
        .bind(&departments)
        .bind(&session.department)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    log::info!("imported {inserted} of {} sessions", sessions.len());
    Ok(inserted)
}

fn session_from_row(row: &PgRow) -> Session {
    let status: String = row.get("status");
    Session {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        date: row.get("session_date"),
        time: row.get("session_time"),
        venue: row.get("venue"),
        session_head: row.get("session_head"),
        status: SessionStatus::parse(&status),
        manually_completed: row.get("manually_completed"),
        target_audience: normalize_audience(row.get("target_audience")),
        target_departments: normalize_departments(row.get("target_departments")),
        department: row.get("department"),
    }
}

/// Every session regardless of status; bucketing happens in the classifier.
pub async fn fetch_all_sessions(pool: &PgPool) -> PortalResult<Vec<Session>> {
    let rows = sqlx::query(
        "SELECT id, title, description, session_date, session_time, venue, session_head, \
         status, manually_completed, target_audience, target_departments, department \
         FROM alumni_portal.sessions",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(session_from_row).collect())
}

pub async fn submit_attendance_response(
    pool: &PgPool,
    session_id: &str,
    student_id: &str,
    will_attend: bool,
) -> PortalResult<()> {
    sqlx::query(
        r#"
        INSERT INTO alumni_portal.session_attendance (session_id, student_id, will_attend)
        VALUES ($1, $2, $3)
        ON CONFLICT (session_id, student_id) DO UPDATE
        SET will_attend = EXCLUDED.will_attend, responded_at = now()
        "#,
    )
    .bind(session_id)
    .bind(student_id)
    .bind(will_attend)
    .execute(pool)
    .await?;

    log::info!("attendance for {session_id} by {student_id}: will_attend={will_attend}");
    Ok(())
}

pub async fn get_student_attendance(
    pool: &PgPool,
    session_id: &str,
    student_id: &str,
) -> PortalResult<Option<AttendanceResponse>> {
    let row = sqlx::query(
        "SELECT session_id, student_id, will_attend FROM alumni_portal.session_attendance \
         WHERE session_id = $1 AND student_id = $2",
    )
    .bind(session_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| attendance_from_row(&row)))
}

pub async fn fetch_student_attendance(
    pool: &PgPool,
    student_id: &str,
) -> PortalResult<HashMap<String, AttendanceResponse>> {
    let rows = sqlx::query(
        "SELECT session_id, student_id, will_attend FROM alumni_portal.session_attendance \
         WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(attendance_from_row)
        .map(|response| (response.session_id.clone(), response))
        .collect())
}

fn attendance_from_row(row: &PgRow) -> AttendanceResponse {
    AttendanceResponse {
        session_id: row.get("session_id"),
        student_id: row.get("student_id"),
        will_attend: row.get("will_attend"),
    }
}

/// Fails with `AlreadySubmitted` if the student has feedback on record.
pub async fn submit_feedback(
    pool: &PgPool,
    session_id: &str,
    student_id: &str,
    feedback: &ValidFeedback,
) -> PortalResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO alumni_portal.session_feedback
        (session_id, student_id, rating, feedback_text)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (session_id, student_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(student_id)
    .bind(i16::from(feedback.rating.get()))
    .bind(&feedback.text)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PortalError::AlreadySubmitted);
    }

    log::info!(
        "feedback for {session_id} by {student_id}: rating {}",
        feedback.rating
    );
    Ok(())
}

pub async fn get_student_feedback(
    pool: &PgPool,
    session_id: &str,
    student_id: &str,
) -> PortalResult<Option<FeedbackRecord>> {
    let row = sqlx::query(
        "SELECT session_id, student_id, rating, feedback_text \
         FROM alumni_portal.session_feedback WHERE session_id = $1 AND student_id = $2",
    )
    .bind(session_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| feedback_from_row(&row)))
}

pub async fn fetch_student_feedback(
    pool: &PgPool,
    student_id: &str,
) -> PortalResult<HashMap<String, FeedbackRecord>> {
    let rows = sqlx::query(
        "SELECT session_id, student_id, rating, feedback_text \
         FROM alumni_portal.session_feedback WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(feedback_from_row)
        .map(|record| (record.session_id.clone(), record))
        .collect())
}

fn feedback_from_row(row: &PgRow) -> FeedbackRecord {
    let rating: i16 = row.get("rating");
    FeedbackRecord {
        session_id: row.get("session_id"),
        student_id: row.get("student_id"),
        rating: rating.clamp(0, i16::from(u8::MAX)) as u8,
        text: row.get("feedback_text"),
    }
}

/// Completing a session also pins it to the previous bucket.
pub async fn update_session_status(
    pool: &PgPool,
    session_id: &str,
    status: &SessionStatus,
    reason: Option<&str>,
) -> PortalResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE alumni_portal.sessions
        SET status = $2,
            status_reason = COALESCE($3, status_reason),
            manually_completed = manually_completed OR $4,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(status.as_str())
    .bind(reason)
    .bind(*status == SessionStatus::Completed)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PortalError::SessionNotFound(session_id.to_string()));
    }

    log::info!("session {session_id} moved to {}", status.as_str());
    Ok(())
}

pub async fn delete_session(pool: &PgPool, session_id: &str) -> PortalResult<()> {
    let result = sqlx::query("DELETE FROM alumni_portal.sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PortalError::SessionNotFound(session_id.to_string()));
    }

    log::info!("session {session_id} deleted");
    Ok(())
}

pub async fn attendance_tallies(pool: &PgPool) -> PortalResult<HashMap<String, AttendanceTally>> {
    let rows = sqlx::query(
        "SELECT session_id, \
         COUNT(*) FILTER (WHERE will_attend) AS attending, \
         COUNT(*) FILTER (WHERE NOT will_attend) AS not_attending \
         FROM alumni_portal.session_attendance GROUP BY session_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get::<String, _>("session_id"),
                AttendanceTally {
                    attending: row.get("attending"),
                    not_attending: row.get("not_attending"),
                },
            )
        })
        .collect())
}

pub async fn feedback_summaries(pool: &PgPool) -> PortalResult<HashMap<String, FeedbackSummary>> {
    let rows = sqlx::query(
        "SELECT session_id, COUNT(*) AS feedback_count, AVG(rating)::float8 AS average_rating \
         FROM alumni_portal.session_feedback GROUP BY session_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get::<String, _>("session_id"),
                FeedbackSummary {
                    count: row.get("feedback_count"),
                    average_rating: row.get("average_rating"),
                },
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_counts_split_inserts_from_updates() {
        let mut counts = SeedCounts::default();
        for fresh in [true, false, false, true, false] {
            counts.record(fresh);
        }
        assert_eq!(
            counts,
            SeedCounts {
                inserted: 2,
                updated: 3
            }
        );

        let mut rerun = SeedCounts::default();
        for _ in 0..5 {
            rerun.record(false);
        }
        assert_eq!(rerun.inserted, 0);
    }
}
