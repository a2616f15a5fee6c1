use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, course_division_in, db_conn, gender_track_in, now_rfc3339, optional_str,
    query_failed, required_str, required_uuid, required_uuid_in, time_window_in, weekday_in,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{GenderTrack, Weekday};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct NewSchedule {
    subject_id: String,
    day: Weekday,
    start_time: String,
    end_time: String,
    gender_track: Option<GenderTrack>,
}

/// Validates one schedule entry of the creation form against the store.
fn parse_schedule(
    conn: &Connection,
    req: &Request,
    index: usize,
    entry: &serde_json::Value,
) -> HandlerResult<NewSchedule> {
    let course_division = course_division_in(req, entry, "courseDivision")?;
    let subject_id = required_uuid_in(req, entry, "subjectId")?;
    let day = weekday_in(req, entry, "day")?;
    let (start_time, end_time) = time_window_in(req, entry)?;
    let requested_track = gender_track_in(req, entry, "genderTrack")?;

    let subject = db::get_subject(conn, &subject_id).map_err(|e| query_failed(req, e))?;
    let Some(subject) = subject else {
        return Err(err(
            &req.id,
            "bad_params",
            "subject not found",
            Some(json!({ "index": index, "subjectId": subject_id })),
        ));
    };
    if subject.course_division() != course_division {
        return Err(err(
            &req.id,
            "bad_params",
            "subject does not belong to the selected course/division",
            Some(json!({
                "index": index,
                "subjectId": subject_id,
                "courseDivision": course_division,
            })),
        ));
    }

    let gender_track = if subject.supports_gender_track {
        Some(requested_track.unwrap_or(GenderTrack::Varones))
    } else {
        None
    };

    Ok(NewSchedule {
        subject_id,
        day,
        start_time,
        end_time,
        gender_track,
    })
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = optional_str(req, "userId");

    let Some(entries) = req.params.get("schedules").and_then(|v| v.as_array()) else {
        return bad_params(req, "missing schedules");
    };
    if entries.is_empty() {
        return bad_params(req, "schedules must not be empty");
    }

    // Everything is validated before the first write.
    let mut schedules = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match parse_schedule(conn, req, i, entry) {
            Ok(s) => schedules.push(s),
            Err(e) => return e,
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let teacher_id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();
    if let Err(e) = tx.execute(
        "INSERT INTO teachers(id, last_name, first_name, created_at, user_id) VALUES(?, ?, ?, ?, ?)",
        (&teacher_id, &last_name, &first_name, &created_at, &user_id),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    let mut schedule_ids = Vec::with_capacity(schedules.len());
    for s in &schedules {
        let id = Uuid::new_v4().to_string();
        if let Err(e) = tx.execute(
            "INSERT INTO teacher_subjects(id, teacher_id, subject_id, day, start_time, end_time, gender_track)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                &teacher_id,
                &s.subject_id,
                s.day.as_str(),
                &s.start_time,
                &s.end_time,
                s.gender_track.map(|g| g.as_str()),
            ),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "teacher_subjects" })),
            );
        }
        schedule_ids.push(id);
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(teacher_id = %teacher_id, schedules = schedule_ids.len(), "teacher registered");
    ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "createdAt": created_at,
            "scheduleIds": schedule_ids,
        }),
    )
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };
    let teachers = match db::list_teachers(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let assignments = match db::load_resolved_assignments(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };

    let rows: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| {
            let schedules: Vec<_> = assignments.iter().filter(|a| a.teacher_id == t.id).collect();
            json!({
                "id": t.id,
                "lastName": t.last_name,
                "firstName": t.first_name,
                "displayName": t.display_name(),
                "createdAt": t.created_at,
                "schedules": schedules,
            })
        })
        .collect();
    ok(&req.id, json!({ "teachers": rows }))
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_uuid(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [&teacher_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let removed = match tx.execute(
        "DELETE FROM teacher_subjects WHERE teacher_id = ?",
        [&teacher_id],
    ) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "teacher_subjects" })),
            );
        }
    };

    if let Err(e) = tx.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true, "schedulesDeleted": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
