use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_division_in, db_conn, optional_str, query_failed, required_str, required_uuid,
};
use crate::ipc::types::{AppState, Request};
use crate::model::PHYSICAL_EDUCATION;
use serde_json::json;
use uuid::Uuid;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    match db::list_subjects(conn) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_division = match course_division_in(req, &req.params, "courseDivision") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let order = match req.params.get("order") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_i64() {
            Some(n) => Some(n),
            None => return err(&req.id, "bad_params", "order must be an integer", None),
        },
    };
    let supports_gender_track = match req.params.get("supportsGenderTrack") {
        None | Some(serde_json::Value::Null) => name == PHYSICAL_EDUCATION,
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "supportsGenderTrack must be a boolean",
                    None,
                )
            }
        },
    };
    let user_id = optional_str(req, "userId");

    if order.is_none() {
        tracing::warn!(subject = %name, course_division = %course_division, "subject created without display order");
    }

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name, course, division, sort_order, supports_gender_track, user_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &subject_id,
            &name,
            &course_division.course,
            &course_division.division,
            order,
            supports_gender_track as i64,
            &user_id,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    state.subjects.evict(&course_division);
    ok(
        &req.id,
        json!({
            "subjectId": subject_id,
            "name": name,
            "courseDivision": course_division,
            "order": order,
            "supportsGenderTrack": supports_gender_track,
        }),
    )
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_uuid(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let subject = match db::get_subject(conn, &subject_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "subject not found", None),
        Err(e) => return query_failed(req, e),
    };

    let in_use: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM teacher_subjects WHERE subject_id = ?",
        [&subject_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if in_use > 0 {
        return err(
            &req.id,
            "in_use",
            "subject is referenced by schedules",
            Some(json!({ "scheduleCount": in_use })),
        );
    }

    if let Err(e) = conn.execute("DELETE FROM subjects WHERE id = ?", [&subject_id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    state.subjects.evict(&subject.course_division());
    ok(&req.id, json!({ "ok": true }))
}

/// Subjects offered to the creation form for one course/division.
fn handle_subjects_for_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_division = match course_division_in(req, &req.params, "courseDivision") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let AppState { db, subjects, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match subjects.get_or_load(&course_division, |cd| db::subjects_for_course(conn, cd)) {
        Ok(list) => ok(
            &req.id,
            json!({ "courseDivision": course_division, "subjects": list }),
        ),
        Err(e) => query_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        "subjects.forCourse" => Some(handle_subjects_for_course(state, req)),
        _ => None,
    }
}
