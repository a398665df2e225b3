use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_TITLE: &str = "Untitled Session";
pub const DEFAULT_DESCRIPTION: &str = "No description provided";
pub const TBA: &str = "TBA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StudyYear {
    E1,
    E2,
    E3,
    E4,
}

impl StudyYear {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyYear::E1 => "E-1",
            StudyYear::E2 => "E-2",
            StudyYear::E3 => "E-3",
            StudyYear::E4 => "E-4",
        }
    }
}

impl FromStr for StudyYear {
    type Err = String;

    // Older records store the year without the hyphen.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "E-1" | "E1" => Ok(StudyYear::E1),
            "E-2" | "E2" => Ok(StudyYear::E2),
            "E-3" | "E3" => Ok(StudyYear::E3),
            "E-4" | "E4" => Ok(StudyYear::E4),
            other => Err(format!("unknown year of study '{other}'")),
        }
    }
}

impl fmt::Display for StudyYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Department {
    Cse,
    Ece,
    Eee,
    Civil,
    Mech,
    Chem,
    Mme,
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::Cse,
        Department::Ece,
        Department::Eee,
        Department::Civil,
        Department::Mech,
        Department::Chem,
        Department::Mme,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Department::Cse => "CSE",
            Department::Ece => "ECE",
            Department::Eee => "EEE",
            Department::Civil => "CIVIL",
            Department::Mech => "MECH",
            Department::Chem => "CHEM",
            Department::Mme => "MME",
        }
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|dept| dept.code() == value.trim())
            .ok_or_else(|| format!("unknown department '{}'", value.trim()))
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One entry of a session's `targetAudience`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Year(StudyYear),
    Other(String),
}

impl Audience {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "all" {
            return Audience::All;
        }
        match raw.parse::<StudyYear>() {
            Ok(year) => Audience::Year(year),
            Err(_) => Audience::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::All => f.write_str("all"),
            Audience::Year(year) => f.write_str(year.as_str()),
            Audience::Other(raw) => f.write_str(raw),
        }
    }
}

/// One entry of a session's `targetDepartments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentTarget {
    All,
    Dept(Department),
    Other(String),
}

impl DepartmentTarget {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "ALL" {
            return DepartmentTarget::All;
        }
        match raw.parse::<Department>() {
            Ok(dept) => DepartmentTarget::Dept(dept),
            Err(_) => DepartmentTarget::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for DepartmentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartmentTarget::All => f.write_str("ALL"),
            DepartmentTarget::Dept(dept) => f.write_str(dept.code()),
            DepartmentTarget::Other(raw) => f.write_str(raw),
        }
    }
}

macro_rules! serialize_as_display {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }
        )*
    };
}

serialize_as_display!(StudyYear, Department, Audience, DepartmentTarget);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "upcoming",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Rejected => "rejected",
            SessionStatus::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "upcoming" => SessionStatus::Upcoming,
            "ongoing" => SessionStatus::Ongoing,
            "completed" => SessionStatus::Completed,
            "cancelled" => SessionStatus::Cancelled,
            "rejected" => SessionStatus::Rejected,
            other => {
                log::debug!("unrecognised session status '{other}'");
                SessionStatus::Unknown
            }
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, SessionStatus::Cancelled | SessionStatus::Rejected)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Upcoming
    }
}

/// The portal sends these fields either as a bare value or as an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

fn audience_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Audience>, D::Error> {
    let raw: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(normalize_audience(raw.map(OneOrMany::into_vec)))
}

fn department_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<DepartmentTarget>, D::Error> {
    let raw: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(normalize_departments(raw.map(OneOrMany::into_vec)))
}

fn default_audience() -> Vec<Audience> {
    vec![Audience::All]
}

fn default_departments() -> Vec<DepartmentTarget> {
    vec![DepartmentTarget::All]
}

/// An absent field opens the session to everyone; an explicit empty list does not.
pub fn normalize_audience(raw: Option<Vec<String>>) -> Vec<Audience> {
    match raw {
        Some(values) => values.iter().map(|value| Audience::parse(value)).collect(),
        None => default_audience(),
    }
}

pub fn normalize_departments(raw: Option<Vec<String>>) -> Vec<DepartmentTarget> {
    match raw {
        Some(values) => values.iter().map(|value| DepartmentTarget::parse(value)).collect(),
        None => default_departments(),
    }
}

/// Accepts `2025-06-10` as well as full timestamps such as `2025-06-10T00:00:00.000Z`.
pub fn parse_session_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.date_naive());
    }
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn session_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_session_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable session date '{raw}'")))
}

fn session_head<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Head {
        Name(String),
        User {
            #[serde(alias = "fullName")]
            name: Option<String>,
        },
    }

    let head: Option<Head> = Option::deserialize(deserializer)?;
    Ok(head.and_then(|head| match head {
        Head::Name(name) => Some(name),
        Head::User { name } => name,
    }))
}

fn status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SessionStatus, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|value| SessionStatus::parse(&value)).unwrap_or_default())
}

/// A session as stored by the portal backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "session_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "session_head")]
    pub session_head: Option<String>,
    #[serde(default, deserialize_with = "status")]
    pub status: SessionStatus,
    #[serde(default)]
    pub manually_completed: bool,
    #[serde(default = "default_audience", deserialize_with = "audience_list")]
    pub target_audience: Vec<Audience>,
    #[serde(default = "default_departments", deserialize_with = "department_list")]
    pub target_departments: Vec<DepartmentTarget>,
    #[serde(default)]
    pub department: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            date,
            time: None,
            venue: None,
            session_head: None,
            status: SessionStatus::Upcoming,
            manually_completed: false,
            target_audience: default_audience(),
            target_departments: default_departments(),
            department: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Ongoing,
    Upcoming,
    Previous,
}

impl Bucket {
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Ongoing => "Ongoing",
            Bucket::Upcoming => "Upcoming",
            Bucket::Previous => "Previous",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedSession {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub session_head: String,
    pub status: SessionStatus,
    pub manually_completed: bool,
    pub target_audience: Vec<Audience>,
    pub target_departments: Vec<DepartmentTarget>,
    pub department: Option<String>,
    pub bucket: Bucket,
    pub month: String,
    pub day: u32,
    #[serde(skip)]
    pub starts_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Buckets {
    pub ongoing: Vec<ClassifiedSession>,
    pub upcoming: Vec<ClassifiedSession>,
    pub previous: Vec<ClassifiedSession>,
}

impl Buckets {
    pub fn len(&self) -> usize {
        self.ongoing.len() + self.upcoming.len() + self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedSession> {
        self.ongoing
            .iter()
            .chain(self.upcoming.iter())
            .chain(self.previous.iter())
    }

    pub fn find(&self, session_id: &str) -> Option<&ClassifiedSession> {
        self.iter().find(|session| session.id == session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
    Alumni,
    Faculty,
}

/// The signed-in user looking at a session list.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: String,
    pub role: Role,
    pub year_of_study: Option<StudyYear>,
    pub department: Option<Department>,
}

impl Viewer {
    pub fn student(user_id: impl Into<String>, year: StudyYear, department: Department) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Student,
            year_of_study: Some(year),
            department: Some(department),
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
            year_of_study: None,
            department: None,
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceResponse {
    pub session_id: String,
    pub student_id: String,
    pub will_attend: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub session_id: String,
    pub student_id: String,
    pub rating: u8,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    pub attending: i64,
    pub not_attending: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedbackSummary {
    pub count: i64,
    pub average_rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_year_spelling_is_accepted() {
        assert_eq!("E1".parse::<StudyYear>(), Ok(StudyYear::E1));
        assert_eq!(Audience::parse("E3"), Audience::Year(StudyYear::E3));
        assert_eq!(Audience::parse("E-3"), Audience::Year(StudyYear::E3));
    }

    #[test]
    fn padded_wildcards_still_match_everyone() {
        assert_eq!(Audience::parse(" all"), Audience::All);
        assert_eq!(Audience::parse("E-1 "), Audience::Year(StudyYear::E1));
        assert_eq!(DepartmentTarget::parse("ALL "), DepartmentTarget::All);
        assert_eq!(
            DepartmentTarget::parse(" CSE"),
            DepartmentTarget::Dept(Department::Cse)
        );
        assert_eq!(Audience::parse(" x "), Audience::Other("x".to_string()));
    }

    #[test]
    fn unknown_targets_are_kept_verbatim() {
        assert_eq!(Audience::parse("ALL"), Audience::Other("ALL".to_string()));
        assert_eq!(
            DepartmentTarget::parse("all"),
            DepartmentTarget::Other("all".to_string())
        );
    }

    #[test]
    fn scalar_targets_are_wrapped_in_lists() {
        let session: Session = serde_json::from_value(serde_json::json!({
            "_id": "s1",
            "date": "2025-06-10T00:00:00.000Z",
            "targetAudience": "E2",
            "targetDepartments": "CSE"
        }))
        .expect("session");

        assert_eq!(session.target_audience, vec![Audience::Year(StudyYear::E2)]);
        assert_eq!(
            session.target_departments,
            vec![DepartmentTarget::Dept(Department::Cse)]
        );
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2025, 6, 10).expect("date"));
    }

    #[test]
    fn absent_targets_default_to_wildcards_but_empty_lists_stay_empty() {
        let absent: Session = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "date": "2025-06-10"
        }))
        .expect("session");
        assert_eq!(absent.target_audience, vec![Audience::All]);
        assert_eq!(absent.target_departments, vec![DepartmentTarget::All]);
        assert_eq!(absent.status, SessionStatus::Upcoming);

        let empty: Session = serde_json::from_value(serde_json::json!({
            "id": "s2",
            "date": "2025-06-10",
            "targetAudience": [],
            "targetDepartments": null
        }))
        .expect("session");
        assert!(empty.target_audience.is_empty());
        assert_eq!(empty.target_departments, vec![DepartmentTarget::All]);
    }

    #[test]
    fn session_head_accepts_populated_user() {
        let session: Session = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "date": "2025-06-10",
            "sessionHead": { "name": "Dr. Rao", "email": "rao@example.edu" },
            "status": "archived"
        }))
        .expect("session");
        assert_eq!(session.session_head.as_deref(), Some("Dr. Rao"));
        assert_eq!(session.status, SessionStatus::Unknown);
    }

    #[test]
    fn session_date_rejects_garbage() {
        assert!(parse_session_date("next tuesday").is_none());
        assert_eq!(
            parse_session_date("2025-06-10T23:30:00+05:30"),
            NaiveDate::from_ymd_opt(2025, 6, 10)
        );
    }
}
