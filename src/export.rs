use crate::model::{CourseDivision, Prefect};
use crate::schedule::CourseGroup;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_TITLE: &str = "Horarios de Atención a padres";

const CELL_STYLE: &str = "border: 1px solid #ddd; padding: 8px;";

/// Page setup handed to the PDF renderer alongside the HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportLayout {
    pub format: String,
    pub orientation: String,
    pub margin_mm: f64,
    pub image_type: String,
    pub image_quality: f64,
    pub scale: f64,
    pub filename: String,
    pub title: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            format: "a4".to_string(),
            orientation: "portrait".to_string(),
            margin_mm: 10.0,
            image_type: "jpeg".to_string(),
            image_quality: 0.98,
            scale: 2.0,
            filename: "horarios-atencion.pdf".to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ExportLayout {
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.orientation.as_str(), "portrait" | "landscape") {
            return Err("orientation must be portrait or landscape".to_string());
        }
        if self.format.trim().is_empty() {
            return Err("format must not be empty".to_string());
        }
        if !(self.margin_mm >= 0.0) {
            return Err("marginMm must be >= 0".to_string());
        }
        if !(self.image_quality > 0.0 && self.image_quality <= 1.0) {
            return Err("imageQuality must be in (0, 1]".to_string());
        }
        if !(self.scale > 0.0) {
            return Err("scale must be > 0".to_string());
        }
        if self.filename.trim().is_empty() {
            return Err("filename must not be empty".to_string());
        }
        Ok(())
    }

    pub fn for_prefect(&self, course_division: &CourseDivision) -> Self {
        Self {
            filename: format!("preceptores-{course_division}.pdf"),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRow {
    pub teacher: String,
    pub subject: String,
    pub day: String,
    pub time_range: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSection {
    pub heading: String,
    pub rows: Vec<DocumentRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefectHeading {
    pub name: String,
    pub course_division: CourseDivision,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDocument {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefect: Option<PrefectHeading>,
    pub sections: Vec<DocumentSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    /// Nothing is scheduled for the prefect's course/division.
    NoAssignments { course_division: CourseDivision },
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::NoAssignments { .. } => "no_assignments",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ExportError::NoAssignments { course_division } => {
                format!("no hay horarios registrados para {course_division}")
            }
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            ExportError::NoAssignments { course_division } => {
                json!({ "courseDivision": course_division })
            }
        }
    }
}

pub fn time_range(start: &str, end: &str) -> String {
    format!("{start} – {end}")
}

fn section(group: &CourseGroup) -> DocumentSection {
    DocumentSection {
        heading: group.course_division.to_string(),
        rows: group
            .assignments
            .iter()
            .map(|g| DocumentRow {
                teacher: g.assignment.teacher_display_name(),
                subject: g.subject_label.clone(),
                day: g.assignment.day.as_str().to_string(),
                time_range: time_range(&g.assignment.start_time, &g.assignment.end_time),
            })
            .collect(),
    }
}

pub fn compose_schedule_document(groups: &[CourseGroup], title: &str) -> ScheduleDocument {
    ScheduleDocument {
        title: title.to_string(),
        prefect: None,
        sections: groups.iter().map(section).collect(),
    }
}

/// Same composition restricted to one prefect's course/division. Refuses
/// rather than producing a document with no rows.
pub fn compose_prefect_document(
    groups: &[CourseGroup],
    prefect: &Prefect,
    title: &str,
) -> Result<ScheduleDocument, ExportError> {
    let key = prefect.course_division();
    let sections: Vec<DocumentSection> = groups
        .iter()
        .filter(|g| g.course_division == key && !g.assignments.is_empty())
        .map(section)
        .collect();
    if sections.is_empty() {
        return Err(ExportError::NoAssignments {
            course_division: key,
        });
    }
    Ok(ScheduleDocument {
        title: title.to_string(),
        prefect: Some(PrefectHeading {
            name: prefect.display_name(),
            course_division: key,
        }),
        sections,
    })
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render_html(doc: &ScheduleDocument) -> String {
    let mut html = String::new();
    html.push_str("<div style=\"font-family: Arial, sans-serif;\">\n");
    html.push_str(&format!(
        "  <h2 style=\"text-align: center;\">{}</h2>\n",
        escape_html(&doc.title)
    ));
    if let Some(p) = &doc.prefect {
        html.push_str(&format!(
            "  <p style=\"text-align: center;\"><strong>Preceptor:</strong> {} &middot; <strong>Curso:</strong> {}</p>\n",
            escape_html(&p.name),
            escape_html(&p.course_division.to_string())
        ));
    }
    for s in &doc.sections {
        html.push_str(&format!(
            "  <h3 style=\"margin-top: 20px; color: #333;\">{}</h3>\n",
            escape_html(&s.heading)
        ));
        html.push_str(
            "  <table style=\"width: 100%; border-collapse: collapse; margin-top: 10px;\">\n",
        );
        html.push_str("    <thead>\n      <tr style=\"background-color: #f2f2f2;\">\n");
        for h in ["Profesor", "Materia", "Día", "Horario"] {
            html.push_str(&format!("        <th style=\"{CELL_STYLE}\">{h}</th>\n"));
        }
        html.push_str("      </tr>\n    </thead>\n    <tbody>\n");
        for r in &s.rows {
            html.push_str("      <tr>\n");
            for cell in [&r.teacher, &r.subject, &r.day, &r.time_range] {
                html.push_str(&format!(
                    "        <td style=\"{CELL_STYLE}\">{}</td>\n",
                    escape_html(cell)
                ));
            }
            html.push_str("      </tr>\n");
        }
        html.push_str("    </tbody>\n  </table>\n");
    }
    html.push_str("</div>\n");
    html
}
