use crate::model::{
    CourseDivision, GenderTrack, Prefect, ResolvedAssignment, Subject, Teacher, Weekday,
    PHYSICAL_EDUCATION,
};
use crate::schedule::DuplicateCandidate;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;

pub const DB_FILE: &str = "horarios.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            user_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_created ON teachers(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            course TEXT NOT NULL,
            division TEXT NOT NULL,
            sort_order INTEGER,
            user_id TEXT
        )",
        [],
    )?;
    ensure_subjects_gender_track(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_course ON subjects(course, division)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS prefects(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            course TEXT NOT NULL,
            division TEXT NOT NULL,
            created_at TEXT NOT NULL,
            user_id TEXT
        )",
        [],
    )?;

    // No foreign key on subject_id: rows pointing at a removed subject still
    // load and are skipped by grouping.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_subjects(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            day TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            gender_track TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_subjects_teacher ON teacher_subjects(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_subjects_subject ON teacher_subjects(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_subjects_gender_track(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "subjects", "supports_gender_track")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE subjects ADD COLUMN supports_gender_track INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    // Older workspaces keyed the boys/girls split off the subject name.
    conn.execute(
        "UPDATE subjects SET supports_gender_track = 1 WHERE name = ?",
        [PHYSICAL_EDUCATION],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn teacher_from_row(row: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        created_at: row.get(3)?,
        user_id: row.get(4)?,
    })
}

pub fn list_teachers(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, created_at, user_id
         FROM teachers
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([], teacher_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn subject_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Subject> {
    let supports: i64 = row.get(offset + 5)?;
    Ok(Subject {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        course: row.get(offset + 2)?,
        division: row.get(offset + 3)?,
        display_order: row.get(offset + 4)?,
        supports_gender_track: supports != 0,
    })
}

pub fn list_subjects(conn: &Connection) -> anyhow::Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, course, division, sort_order, supports_gender_track
         FROM subjects
         ORDER BY course, division, COALESCE(sort_order, 0), rowid",
    )?;
    let rows = stmt
        .query_map([], |r| subject_from_row(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn subjects_for_course(conn: &Connection, key: &CourseDivision) -> anyhow::Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, course, division, sort_order, supports_gender_track
         FROM subjects
         WHERE course = ? AND division = ?
         ORDER BY COALESCE(sort_order, 0), rowid",
    )?;
    let rows = stmt
        .query_map((&key.course, &key.division), |r| subject_from_row(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> anyhow::Result<Option<Subject>> {
    let s = conn
        .query_row(
            "SELECT id, name, course, division, sort_order, supports_gender_track
             FROM subjects WHERE id = ?",
            [subject_id],
            |r| subject_from_row(r, 0),
        )
        .optional()?;
    Ok(s)
}

fn prefect_from_row(row: &Row<'_>) -> rusqlite::Result<Prefect> {
    Ok(Prefect {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        course: row.get(3)?,
        division: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn list_prefects(conn: &Connection) -> anyhow::Result<Vec<Prefect>> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, course, division, created_at
         FROM prefects
         ORDER BY course, division, last_name, first_name",
    )?;
    let rows = stmt
        .query_map([], prefect_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_prefect(conn: &Connection, prefect_id: &str) -> anyhow::Result<Option<Prefect>> {
    let p = conn
        .query_row(
            "SELECT id, last_name, first_name, course, division, created_at
             FROM prefects WHERE id = ?",
            [prefect_id],
            prefect_from_row,
        )
        .optional()?;
    Ok(p)
}

/// Every assignment joined to its teacher and (if it still exists) its
/// subject. Rows come back newest teacher first, then in insertion order.
pub fn load_resolved_assignments(conn: &Connection) -> anyhow::Result<Vec<ResolvedAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT
           ts.id, ts.teacher_id, t.last_name, t.first_name, ts.subject_id,
           ts.day, ts.start_time, ts.end_time, ts.gender_track,
           s.id, s.name, s.course, s.division, s.sort_order, s.supports_gender_track
         FROM teacher_subjects ts
         JOIN teachers t ON t.id = ts.teacher_id
         LEFT JOIN subjects s ON s.id = ts.subject_id
         ORDER BY t.created_at DESC, t.rowid DESC, ts.rowid",
    )?;
    let raw = stmt
        .query_map([], |r| {
            let subject_present: Option<String> = r.get(9)?;
            let subject = match subject_present {
                Some(_) => Some(subject_from_row(r, 9)?),
                None => None,
            };
            let day: String = r.get(5)?;
            let gender: Option<String> = r.get(8)?;
            Ok((
                ResolvedAssignment {
                    id: r.get(0)?,
                    teacher_id: r.get(1)?,
                    teacher_last_name: r.get(2)?,
                    teacher_first_name: r.get(3)?,
                    subject_id: r.get(4)?,
                    subject,
                    day: Weekday::Lunes,
                    start_time: r.get(6)?,
                    end_time: r.get(7)?,
                    gender_track: None,
                },
                day,
                gender,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(raw.len());
    for (mut a, day, gender) in raw {
        let Some(d) = Weekday::parse(&day) else {
            tracing::warn!(assignment_id = %a.id, day = %day, "skipping assignment with unknown day");
            continue;
        };
        a.day = d;
        a.gender_track = gender.as_deref().and_then(GenderTrack::parse);
        out.push(a);
    }
    Ok(out)
}

/// Raw assignment keys in insertion order, for duplicate detection.
pub fn load_duplicate_candidates(conn: &Connection) -> anyhow::Result<Vec<DuplicateCandidate>> {
    let mut stmt = conn.prepare(
        "SELECT id, teacher_id, subject_id, day, start_time, end_time
         FROM teacher_subjects
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(DuplicateCandidate {
                id: r.get(0)?,
                teacher_id: r.get(1)?,
                subject_id: r.get(2)?,
                day: r.get(3)?,
                start_time: r.get(4)?,
                end_time: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
