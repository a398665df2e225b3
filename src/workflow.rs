use std::fmt;
use std::str::FromStr;

use crate::eligibility::is_eligible;
use crate::error::{PortalError, PortalResult};
use crate::models::{
    AttendanceResponse, Bucket, ClassifiedSession, FeedbackRecord, Role, SessionStatus, Viewer,
};

pub const MAX_FEEDBACK_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> PortalResult<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(PortalError::Validation(format!(
                "rating must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<f64> for Rating {
    type Error = PortalError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(PortalError::Validation(format!(
                "rating must be a whole number, got {value}"
            )));
        }
        Rating::new(value as i64)
    }
}

impl FromStr for Rating {
    type Err = PortalError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| PortalError::Validation(format!("rating '{raw}' is not a number")))?;
        Rating::try_from(value)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw feedback form input, before validation.
#[derive(Debug, Clone, Default)]
pub struct FeedbackDraft {
    pub rating: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeedback {
    pub rating: Rating,
    pub text: String,
}

impl FeedbackDraft {
    pub fn validate(&self) -> PortalResult<ValidFeedback> {
        let rating = match self.rating.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(PortalError::Validation("a rating is required".to_string()))
            }
            Some(raw) => raw.parse::<Rating>()?,
        };

        let text = self.text.clone().unwrap_or_default();
        let length = text.chars().count();
        if length > MAX_FEEDBACK_CHARS {
            return Err(PortalError::Validation(format!(
                "feedback is {length} characters, the limit is {MAX_FEEDBACK_CHARS}"
            )));
        }

        Ok(ValidFeedback { rating, text })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    NotApplicable,
    Unanswered,
    Answered { will_attend: bool },
}

impl AttendanceState {
    pub fn resolve(
        session: &ClassifiedSession,
        viewer: &Viewer,
        prior: Option<&AttendanceResponse>,
    ) -> Self {
        if !student_can_respond(session, viewer) || session.bucket != Bucket::Upcoming {
            return AttendanceState::NotApplicable;
        }
        match prior {
            Some(response) => AttendanceState::Answered {
                will_attend: response.will_attend,
            },
            None => AttendanceState::Unanswered,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, AttendanceState::NotApplicable)
    }

    /// Answering again replaces the previous answer.
    pub fn submit(self, will_attend: bool) -> PortalResult<Self> {
        match self {
            AttendanceState::NotApplicable => Err(PortalError::NotEligible(
                "attendance is only collected from eligible students for upcoming sessions"
                    .to_string(),
            )),
            AttendanceState::Unanswered | AttendanceState::Answered { .. } => {
                Ok(AttendanceState::Answered { will_attend })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackState {
    NotApplicable,
    NoFeedbackYet,
    Submitted { rating: Rating, text: String },
}

impl FeedbackState {
    pub fn resolve(
        session: &ClassifiedSession,
        viewer: &Viewer,
        prior: Option<&FeedbackRecord>,
    ) -> Self {
        if !student_can_respond(session, viewer) || session.bucket != Bucket::Previous {
            return FeedbackState::NotApplicable;
        }
        match prior {
            Some(record) => match Rating::new(i64::from(record.rating)) {
                Ok(rating) => FeedbackState::Submitted {
                    rating,
                    text: record.text.clone(),
                },
                Err(_) => {
                    log::debug!(
                        "stored feedback for session {} has rating {}, clamping",
                        record.session_id,
                        record.rating
                    );
                    FeedbackState::Submitted {
                        rating: Rating(record.rating.clamp(Rating::MIN, Rating::MAX)),
                        text: record.text.clone(),
                    }
                }
            },
            None => FeedbackState::NoFeedbackYet,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, FeedbackState::NoFeedbackYet)
    }

    pub fn has_submitted(&self) -> bool {
        matches!(self, FeedbackState::Submitted { .. })
    }

    pub fn submit(&self, draft: &FeedbackDraft) -> PortalResult<(Self, ValidFeedback)> {
        match self {
            FeedbackState::NotApplicable => Err(PortalError::NotEligible(
                "feedback is only collected from eligible students for completed sessions"
                    .to_string(),
            )),
            FeedbackState::Submitted { .. } => Err(PortalError::AlreadySubmitted),
            FeedbackState::NoFeedbackYet => {
                let valid = draft.validate()?;
                let next = FeedbackState::Submitted {
                    rating: valid.rating,
                    text: valid.text.clone(),
                };
                Ok((next, valid))
            }
        }
    }
}

fn student_can_respond(session: &ClassifiedSession, viewer: &Viewer) -> bool {
    viewer.is_student() && is_eligible(session, viewer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AdminAction {
    Start,
    Complete,
    Cancel,
    Delete,
}

impl AdminAction {
    pub fn label(&self) -> &'static str {
        match self {
            AdminAction::Start => "start",
            AdminAction::Complete => "complete",
            AdminAction::Cancel => "cancel",
            AdminAction::Delete => "delete",
        }
    }

    /// Status written by the action; `Delete` removes the session instead.
    pub fn target_status(&self) -> Option<SessionStatus> {
        match self {
            AdminAction::Start => Some(SessionStatus::Ongoing),
            AdminAction::Complete => Some(SessionStatus::Completed),
            AdminAction::Cancel => Some(SessionStatus::Cancelled),
            AdminAction::Delete => None,
        }
    }
}

/// Lifecycle actions to offer on a card. The store does not enforce these.
pub fn admin_actions(session: &ClassifiedSession, viewer: &Viewer) -> Vec<AdminAction> {
    if viewer.role != Role::Admin {
        return Vec::new();
    }

    let mut actions = Vec::new();
    match session.bucket {
        Bucket::Upcoming => actions.push(AdminAction::Start),
        Bucket::Ongoing => actions.push(AdminAction::Complete),
        Bucket::Previous => {}
    }
    actions.push(AdminAction::Cancel);
    actions.push(AdminAction::Delete);
    actions
}

pub fn ensure_admin(viewer: &Viewer) -> PortalResult<()> {
    if viewer.role == Role::Admin {
        Ok(())
    } else {
        Err(PortalError::NotEligible(
            "only admins can change a session's lifecycle".to_string(),
        ))
    }
}

/// Everything a session card needs to decide which controls to render.
#[derive(Debug, Clone)]
pub struct CardView {
    pub eligible: bool,
    pub attendance: AttendanceState,
    pub feedback: FeedbackState,
    pub admin: Vec<AdminAction>,
}

impl CardView {
    pub fn build(
        session: &ClassifiedSession,
        viewer: &Viewer,
        attendance: Option<&AttendanceResponse>,
        feedback: Option<&FeedbackRecord>,
    ) -> Self {
        Self {
            eligible: viewer.is_student() && is_eligible(session, viewer),
            attendance: AttendanceState::resolve(session, viewer, attendance),
            feedback: FeedbackState::resolve(session, viewer, feedback),
            admin: admin_actions(session, viewer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::models::{Audience, Department, DepartmentTarget, Session, StudyYear};
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .expect("valid timestamp")
    }

    fn card_on(day: u32, time: &str) -> ClassifiedSession {
        let mut session = Session::new(
            format!("s-{day}"),
            NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date"),
        );
        session.time = Some(time.to_string());
        session.target_audience = vec![Audience::Year(StudyYear::E3)];
        session.target_departments = vec![DepartmentTarget::Dept(Department::Cse)];
        classify(&[session], now())
            .iter()
            .next()
            .cloned()
            .expect("classified")
    }

    fn student() -> Viewer {
        Viewer::student("stu-1", StudyYear::E3, Department::Cse)
    }

    fn draft(rating: Option<&str>, text: &str) -> FeedbackDraft {
        FeedbackDraft {
            rating: rating.map(str::to_string),
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn attendance_opens_only_for_upcoming_eligible_students() {
        let upcoming = card_on(12, "10:00");
        let ongoing = card_on(10, "11:00");
        assert_eq!(upcoming.bucket, Bucket::Upcoming);
        assert_eq!(ongoing.bucket, Bucket::Ongoing);

        assert_eq!(
            AttendanceState::resolve(&upcoming, &student(), None),
            AttendanceState::Unanswered
        );
        assert_eq!(
            AttendanceState::resolve(&ongoing, &student(), None),
            AttendanceState::NotApplicable
        );

        let other_dept = Viewer::student("stu-2", StudyYear::E3, Department::Ece);
        assert!(!AttendanceState::resolve(&upcoming, &other_dept, None).is_open());

        let mut alumnus = student();
        alumnus.role = Role::Alumni;
        assert!(!AttendanceState::resolve(&upcoming, &alumnus, None).is_open());
    }

    #[test]
    fn attendance_resubmission_overwrites() {
        let upcoming = card_on(12, "10:00");
        let prior = AttendanceResponse {
            session_id: upcoming.id.clone(),
            student_id: "stu-1".to_string(),
            will_attend: true,
        };
        let state = AttendanceState::resolve(&upcoming, &student(), Some(&prior));
        assert_eq!(state, AttendanceState::Answered { will_attend: true });

        let state = state.submit(false).expect("resubmit");
        assert_eq!(state, AttendanceState::Answered { will_attend: false });
        assert!(AttendanceState::NotApplicable.submit(true).is_err());
    }

    #[test]
    fn feedback_is_terminal_once_submitted() {
        let previous = card_on(8, "10:00");
        let state = FeedbackState::resolve(&previous, &student(), None);
        assert!(state.is_editable());

        let (state, valid) = state.submit(&draft(Some("4"), "Great talk")).expect("submit");
        assert_eq!(valid.rating.get(), 4);
        assert!(state.has_submitted());
        assert!(!state.is_editable());
        assert!(matches!(
            state.submit(&draft(Some("5"), "again")),
            Err(PortalError::AlreadySubmitted)
        ));

        let stored = FeedbackRecord {
            session_id: previous.id.clone(),
            student_id: "stu-1".to_string(),
            rating: 4,
            text: "Great talk".to_string(),
        };
        let hydrated = FeedbackState::resolve(&previous, &student(), Some(&stored));
        assert_eq!(hydrated, state);
    }

    #[test]
    fn feedback_form_needs_a_previous_session() {
        let upcoming = card_on(12, "10:00");
        let state = FeedbackState::resolve(&upcoming, &student(), None);
        assert_eq!(state, FeedbackState::NotApplicable);
        assert!(matches!(
            state.submit(&draft(Some("3"), "")),
            Err(PortalError::NotEligible(_))
        ));
    }

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        for bad in ["0", "6", "4.5", "abc", "-1"] {
            assert!(
                matches!(bad.parse::<Rating>(), Err(PortalError::Validation(_))),
                "{bad} should be rejected"
            );
        }
        for good in ["1", "2", "3", "4", "5", "3.0"] {
            assert!(good.parse::<Rating>().is_ok(), "{good} should be accepted");
        }
        assert!(matches!(
            draft(None, "fine").validate(),
            Err(PortalError::Validation(_))
        ));
    }

    #[test]
    fn feedback_text_is_capped_by_characters() {
        let at_limit = "é".repeat(MAX_FEEDBACK_CHARS);
        assert!(draft(Some("5"), &at_limit).validate().is_ok());

        let over = "a".repeat(MAX_FEEDBACK_CHARS + 1);
        assert!(matches!(
            draft(Some("5"), &over).validate(),
            Err(PortalError::Validation(_))
        ));

        let empty = FeedbackDraft {
            rating: Some("2".to_string()),
            text: None,
        };
        assert_eq!(empty.validate().expect("valid").text, "");
    }

    #[test]
    fn admin_actions_follow_bucket() {
        let admin = Viewer::admin("admin-1");
        assert_eq!(
            admin_actions(&card_on(12, "10:00"), &admin),
            vec![AdminAction::Start, AdminAction::Cancel, AdminAction::Delete]
        );
        assert_eq!(
            admin_actions(&card_on(10, "11:00"), &admin),
            vec![AdminAction::Complete, AdminAction::Cancel, AdminAction::Delete]
        );
        assert_eq!(
            admin_actions(&card_on(8, "10:00"), &admin),
            vec![AdminAction::Cancel, AdminAction::Delete]
        );
        assert!(admin_actions(&card_on(12, "10:00"), &student()).is_empty());
        assert!(ensure_admin(&student()).is_err());
    }

    #[test]
    fn card_view_combines_everything() {
        let view = CardView::build(&card_on(12, "10:00"), &student(), None, None);
        assert!(view.eligible);
        assert_eq!(view.attendance, AttendanceState::Unanswered);
        assert_eq!(view.feedback, FeedbackState::NotApplicable);
        assert!(view.admin.is_empty());
    }
}
