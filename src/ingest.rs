use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    normalize_audience, normalize_departments, parse_session_date, Session, SessionStatus,
};

/// One row of a session import file. List columns are `;` separated.
#[derive(Debug, Deserialize)]
pub struct SessionCsvRow {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub session_head: Option<String>,
    pub status: Option<String>,
    pub target_audience: Option<String>,
    pub target_departments: Option<String>,
    pub department: Option<String>,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportedSession {
    pub source_key: String,
    pub session: Session,
}

impl SessionCsvRow {
    pub fn into_session(self) -> Option<ImportedSession> {
        let date = parse_session_date(&self.date)?;
        let mut session = Session::new(Uuid::new_v4().to_string(), date);
        session.title = self.title;
        session.description = self.description;
        session.time = self.time;
        session.venue = self.venue;
        session.session_head = self.session_head;
        session.status = self
            .status
            .map(|raw| SessionStatus::parse(&raw))
            .unwrap_or_default();
        session.target_audience = normalize_audience(split_list(self.target_audience));
        session.target_departments = normalize_departments(split_list(self.target_departments));
        session.department = self.department;

        let source_key = self
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        Some(ImportedSession {
            source_key,
            session,
        })
    }
}

fn split_list(raw: Option<String>) -> Option<Vec<String>> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(
        raw.split(';')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

pub fn read_csv(csv_path: &Path) -> anyhow::Result<Vec<ImportedSession>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut sessions = Vec::new();

    for (line, result) in reader.deserialize::<SessionCsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed row {}", line + 1))?;
        let raw_date = row.date.clone();
        match row.into_session() {
            Some(imported) => sessions.push(imported),
            None => log::warn!("skipping row {}: unparseable date '{}'", line + 1, raw_date),
        }
    }

    Ok(sessions)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionFile {
    List(Vec<serde_json::Value>),
    Wrapped { sessions: Vec<serde_json::Value> },
}

/// Loads sessions exported from the portal API, dropping records that cannot be read.
pub fn load_sessions_json(path: &Path) -> anyhow::Result<Vec<Session>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sessions_json(&contents)
}

pub fn parse_sessions_json(contents: &str) -> anyhow::Result<Vec<Session>> {
    let file: SessionFile =
        serde_json::from_str(contents).context("expected a JSON array of sessions")?;
    let records = match file {
        SessionFile::List(records) => records,
        SessionFile::Wrapped { sessions } => sessions,
    };

    let mut sessions = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Session>(record) {
            Ok(session) => sessions.push(session),
            Err(err) => log::warn!("dropping session record {index}: {err}"),
        }
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Audience, DepartmentTarget, StudyYear};

    fn row(date: &str, audience: Option<&str>, departments: Option<&str>) -> SessionCsvRow {
        SessionCsvRow {
            title: Some("Resume clinic".to_string()),
            description: None,
            date: date.to_string(),
            time: Some("15:00".to_string()),
            venue: Some("Seminar Hall".to_string()),
            session_head: None,
            status: Some("upcoming".to_string()),
            target_audience: audience.map(str::to_string),
            target_departments: departments.map(str::to_string),
            department: Some("CSE".to_string()),
            source_key: None,
        }
    }

    #[test]
    fn csv_lists_are_split_and_normalized() {
        let imported = row("2025-07-01", Some("E3; E-4"), Some(""))
            .into_session()
            .expect("imported");
        assert_eq!(
            imported.session.target_audience,
            vec![Audience::Year(StudyYear::E3), Audience::Year(StudyYear::E4)]
        );
        assert_eq!(imported.session.target_departments, vec![DepartmentTarget::All]);
        assert!(imported.source_key.starts_with("import-"));
    }

    #[test]
    fn csv_row_with_bad_date_is_skipped() {
        assert!(row("July first", None, None).into_session().is_none());
    }

    #[test]
    fn json_loader_accepts_wrapped_payload_and_drops_bad_records() {
        let sessions = parse_sessions_json(
            r#"{ "sessions": [
                { "_id": "a", "date": "2025-06-10", "time": "09:00", "targetAudience": ["all"] },
                { "_id": "b", "title": "missing date" },
                { "_id": "c", "date": "2025-06-11T00:00:00.000Z", "status": "cancelled" }
            ] }"#,
        )
        .expect("parsed");

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "a");
        assert!(sessions[1].status.is_hidden());
    }
}
