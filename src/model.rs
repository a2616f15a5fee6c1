use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject name that historically carried the boys/girls split.
pub const PHYSICAL_EDUCATION: &str = "Educación Física";

/// Canonical course/division order. Grouped output always follows this list.
pub const CANONICAL_COURSE_DIVISIONS: [(&str, &str); 18] = [
    ("1", "I"),
    ("1", "II"),
    ("1", "III"),
    ("2", "I"),
    ("2", "II"),
    ("2", "III"),
    ("3", "I"),
    ("3", "II"),
    ("3", "III"),
    ("4", "I"),
    ("4", "II"),
    ("4", "III"),
    ("5", "I"),
    ("5", "II"),
    ("5", "III"),
    ("6", "I"),
    ("6", "II"),
    ("6", "III"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CourseDivision {
    pub course: String,
    pub division: String,
}

impl CourseDivision {
    pub fn new(course: impl Into<String>, division: impl Into<String>) -> Self {
        Self {
            course: course.into(),
            division: division.into(),
        }
    }

    /// Parses the `"<course> <division>"` form used by selectors.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let course = parts.next()?;
        let division = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(course, division))
    }

    pub fn canonical() -> impl Iterator<Item = CourseDivision> {
        CANONICAL_COURSE_DIVISIONS
            .iter()
            .map(|(c, d)| CourseDivision::new(*c, *d))
    }

    pub fn canonical_index(&self) -> Option<usize> {
        CANONICAL_COURSE_DIVISIONS
            .iter()
            .position(|(c, d)| *c == self.course && *d == self.division)
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical_index().is_some()
    }
}

impl fmt::Display for CourseDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.course, self.division)
    }
}

impl Serialize for CourseDivision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CourseDivision {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CourseDivision::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid course/division: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Lunes,
    Martes,
    #[serde(rename = "Miércoles")]
    Miercoles,
    Jueves,
    Viernes,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Lunes,
        Weekday::Martes,
        Weekday::Miercoles,
        Weekday::Jueves,
        Weekday::Viernes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Lunes => "Lunes",
            Weekday::Martes => "Martes",
            Weekday::Miercoles => "Miércoles",
            Weekday::Jueves => "Jueves",
            Weekday::Viernes => "Viernes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Weekday::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenderTrack {
    Varones,
    Mujeres,
}

impl GenderTrack {
    pub fn as_str(self) -> &'static str {
        match self {
            GenderTrack::Varones => "Varones",
            GenderTrack::Mujeres => "Mujeres",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Varones" => Some(GenderTrack::Varones),
            "Mujeres" => Some(GenderTrack::Mujeres),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub last_name: String,
    pub first_name: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Teacher {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub course: String,
    pub division: String,
    pub display_order: Option<i64>,
    pub supports_gender_track: bool,
}

impl Subject {
    pub fn course_division(&self) -> CourseDivision {
        CourseDivision::new(self.course.clone(), self.division.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefect {
    pub id: String,
    pub last_name: String,
    pub first_name: String,
    pub course: String,
    pub division: String,
    pub created_at: String,
}

impl Prefect {
    pub fn course_division(&self) -> CourseDivision {
        CourseDivision::new(self.course.clone(), self.division.clone())
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// One teacher-subject-day-time row with its subject join already applied.
/// `subject` is `None` when the reference no longer resolves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAssignment {
    pub id: String,
    pub teacher_id: String,
    pub teacher_last_name: String,
    pub teacher_first_name: String,
    pub subject_id: String,
    pub subject: Option<Subject>,
    pub day: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub gender_track: Option<GenderTrack>,
}

impl ResolvedAssignment {
    pub fn teacher_display_name(&self) -> String {
        format!("{}, {}", self.teacher_last_name, self.teacher_first_name)
    }
}
