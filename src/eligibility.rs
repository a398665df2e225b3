use crate::models::{Audience, ClassifiedSession, DepartmentTarget, Viewer};

/// Whether the viewer falls inside the session's year and department targets.
///
/// Role is not considered here; callers only offer student actions to students.
pub fn is_eligible(session: &ClassifiedSession, viewer: &Viewer) -> bool {
    year_eligible(&session.target_audience, viewer)
        && dept_eligible(&session.target_departments, viewer)
}

fn year_eligible(audience: &[Audience], viewer: &Viewer) -> bool {
    audience.iter().any(|entry| match entry {
        Audience::All => true,
        Audience::Year(year) => viewer.year_of_study == Some(*year),
        Audience::Other(_) => false,
    })
}

fn dept_eligible(departments: &[DepartmentTarget], viewer: &Viewer) -> bool {
    departments.iter().any(|entry| match entry {
        DepartmentTarget::All => true,
        DepartmentTarget::Dept(dept) => viewer.department == Some(*dept),
        DepartmentTarget::Other(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::models::{Department, Session, StudyYear};
    use chrono::NaiveDate;

    fn card(audience: &[&str], departments: &[&str]) -> ClassifiedSession {
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date");
        let mut session = Session::new("s1", date);
        session.target_audience = audience.iter().map(|raw| Audience::parse(raw)).collect();
        session.target_departments = departments
            .iter()
            .map(|raw| DepartmentTarget::parse(raw))
            .collect();
        let now = date.and_hms_opt(0, 0, 0).expect("valid time");
        classify(&[session], now)
            .iter()
            .next()
            .cloned()
            .expect("classified")
    }

    #[test]
    fn both_checks_must_pass() {
        let viewer = Viewer::student("u1", StudyYear::E2, Department::Ece);
        assert!(!is_eligible(&card(&["all"], &["CSE"]), &viewer));
        assert!(!is_eligible(&card(&["E-3"], &["ALL"]), &viewer));
        assert!(is_eligible(&card(&["E-1", "E-2"], &["CSE", "ECE"]), &viewer));
    }

    #[test]
    fn wildcards_admit_every_student() {
        let session = card(&["all"], &["ALL"]);
        for year in [StudyYear::E1, StudyYear::E2, StudyYear::E3, StudyYear::E4] {
            for dept in Department::ALL {
                assert!(is_eligible(&session, &Viewer::student("u", year, dept)));
            }
        }
    }

    #[test]
    fn legacy_year_targets_match() {
        let viewer = Viewer::student("u1", StudyYear::E1, Department::Mech);
        assert!(is_eligible(&card(&["E1"], &["MECH"]), &viewer));
    }

    #[test]
    fn empty_targets_admit_nobody() {
        let viewer = Viewer::student("u1", StudyYear::E4, Department::Cse);
        assert!(!is_eligible(&card(&[], &["ALL"]), &viewer));
        assert!(!is_eligible(&card(&["all"], &[]), &viewer));
    }

    #[test]
    fn viewer_without_year_only_matches_wildcard() {
        let viewer = Viewer::admin("a1");
        assert!(!is_eligible(&card(&["E-2"], &["ALL"]), &viewer));
        assert!(is_eligible(&card(&["all"], &["ALL"]), &viewer));
    }
}
