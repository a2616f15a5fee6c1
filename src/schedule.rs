use crate::model::{CourseDivision, GenderTrack, ResolvedAssignment, Subject, Teacher, Weekday};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Sort value used when a subject carries no display order.
pub const MISSING_ORDER: i64 = 0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedAssignment {
    #[serde(flatten)]
    pub assignment: ResolvedAssignment,
    pub subject_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGroup {
    pub course_division: CourseDivision,
    pub assignments: Vec<GroupedAssignment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSchedule {
    pub teacher: Teacher,
    pub groups: Vec<CourseGroup>,
}

/// Row label for a subject. The gender-track qualifier only shows for
/// subjects flagged as carrying one.
pub fn subject_label(subject: &Subject, gender_track: Option<GenderTrack>) -> String {
    match gender_track {
        Some(g) if subject.supports_gender_track => format!("{} ({})", subject.name, g.as_str()),
        _ => subject.name.clone(),
    }
}

fn effective_order(subject: &Subject) -> i64 {
    subject.display_order.unwrap_or(MISSING_ORDER)
}

/// Groups assignments by their subject's course/division.
///
/// Groups come out in canonical course/division order, empty groups are
/// never emitted, and keys outside the canonical list are dropped. Rows whose
/// subject does not resolve are skipped. Within a group rows are sorted by
/// display order (missing = 0); the sort is stable so ties keep input order.
pub fn aggregate(assignments: &[ResolvedAssignment]) -> Vec<CourseGroup> {
    let mut by_key: HashMap<CourseDivision, Vec<(&ResolvedAssignment, &Subject)>> = HashMap::new();
    let mut warned: HashSet<&str> = HashSet::new();

    for a in assignments {
        let Some(subject) = a.subject.as_ref() else {
            tracing::debug!(assignment_id = %a.id, subject_id = %a.subject_id, "skipping assignment with unresolved subject");
            continue;
        };
        if subject.display_order.is_none() && warned.insert(subject.id.as_str()) {
            tracing::warn!(
                subject_id = %subject.id,
                subject = %subject.name,
                "subject has no display order; sorting as {}",
                MISSING_ORDER
            );
        }
        by_key
            .entry(subject.course_division())
            .or_default()
            .push((a, subject));
    }

    let mut groups = Vec::new();
    for key in CourseDivision::canonical() {
        let Some(mut rows) = by_key.remove(&key) else {
            continue;
        };
        rows.sort_by_key(|(_, s)| effective_order(s));
        let assignments = rows
            .into_iter()
            .map(|(a, s)| GroupedAssignment {
                subject_label: subject_label(s, a.gender_track),
                assignment: a.clone(),
            })
            .collect();
        groups.push(CourseGroup {
            course_division: key,
            assignments,
        });
    }

    for key in by_key.keys() {
        tracing::debug!(course_division = %key, "dropping non-canonical course/division");
    }

    groups
}

/// Per-teacher view used by the dashboard. Teachers keep the order given.
pub fn aggregate_by_teacher(
    teachers: &[Teacher],
    assignments: &[ResolvedAssignment],
) -> Vec<TeacherSchedule> {
    let mut by_teacher: HashMap<&str, Vec<ResolvedAssignment>> = HashMap::new();
    for a in assignments {
        by_teacher
            .entry(a.teacher_id.as_str())
            .or_default()
            .push(a.clone());
    }
    teachers
        .iter()
        .map(|t| TeacherSchedule {
            teacher: t.clone(),
            groups: by_teacher
                .get(t.id.as_str())
                .map(|rows| aggregate(rows))
                .unwrap_or_default(),
        })
        .collect()
}

/// Raw assignment columns that take part in duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCandidate {
    pub id: String,
    pub teacher_id: String,
    pub subject_id: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct DuplicateKey<'a> {
    teacher_id: &'a str,
    subject_id: &'a str,
    day: &'a str,
    start_time: &'a str,
    end_time: &'a str,
}

impl<'a> From<&'a DuplicateCandidate> for DuplicateKey<'a> {
    fn from(c: &'a DuplicateCandidate) -> Self {
        Self {
            teacher_id: &c.teacher_id,
            subject_id: &c.subject_id,
            day: &c.day,
            start_time: &c.start_time,
            end_time: &c.end_time,
        }
    }
}

/// Ids of redundant rows, in input order. The first row seen for each
/// `(teacher, subject, day, start, end)` key is kept. The gender track is
/// not part of the key.
pub fn find_duplicates(rows: &[DuplicateCandidate]) -> Vec<String> {
    let mut seen: HashSet<DuplicateKey<'_>> = HashSet::new();
    rows.iter()
        .filter(|r| !seen.insert(DuplicateKey::from(*r)))
        .map(|r| r.id.clone())
        .collect()
}

/// Memoised subjects-by-course lookup for the assignment form.
///
/// An entry is only stored after a successful load, and is evicted whenever a
/// subject of that course/division is created or deleted.
#[derive(Debug, Default)]
pub struct SubjectCache {
    entries: HashMap<CourseDivision, Vec<Subject>>,
}

impl SubjectCache {
    pub fn get_or_load<F>(&mut self, key: &CourseDivision, load: F) -> anyhow::Result<&[Subject]>
    where
        F: FnOnce(&CourseDivision) -> anyhow::Result<Vec<Subject>>,
    {
        if !self.entries.contains_key(key) {
            let loaded = load(key)?;
            self.entries.insert(key.clone(), loaded);
        }
        Ok(self.entries.get(key).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn evict(&mut self, key: &CourseDivision) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn contains(&self, key: &CourseDivision) -> bool {
        self.entries.contains_key(key)
    }
}

/// Day labels in week order, for selectors.
pub fn weekdays() -> Vec<&'static str> {
    Weekday::ALL.iter().map(|d| d.as_str()).collect()
}
