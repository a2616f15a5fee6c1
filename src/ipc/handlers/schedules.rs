use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, query_failed, required_uuid, time_window_in, weekday_in};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use serde_json::json;

pub const NO_DUPLICATES_MESSAGE: &str = "no duplicates found";

fn handle_schedules_grouped(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "groups": [] }));
    };
    match db::load_resolved_assignments(conn) {
        Ok(rows) => ok(&req.id, json!({ "groups": schedule::aggregate(&rows) })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_dashboard_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [], "groups": [] }));
    };
    let teachers = match db::list_teachers(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let rows = match db::load_resolved_assignments(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    ok(
        &req.id,
        json!({
            "teachers": schedule::aggregate_by_teacher(&teachers, &rows),
            "groups": schedule::aggregate(&rows),
        }),
    )
}

fn handle_schedules_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let schedule_id = match required_uuid(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day = match weekday_in(req, &req.params, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (start_time, end_time) = match time_window_in(req, &req.params) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match conn.execute(
        "UPDATE teacher_subjects SET day = ?, start_time = ?, end_time = ? WHERE id = ?",
        (day.as_str(), &start_time, &end_time, &schedule_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "schedule not found", None),
        Ok(_) => ok(
            &req.id,
            json!({
                "scheduleId": schedule_id,
                "day": day,
                "startTime": start_time,
                "endTime": end_time,
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "teacher_subjects" })),
        ),
    }
}

fn handle_schedules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let schedule_id = match required_uuid(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM teacher_subjects WHERE id = ?", [&schedule_id]) {
        Ok(0) => err(&req.id, "not_found", "schedule not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "teacher_subjects" })),
        ),
    }
}

fn handle_find_duplicates(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::load_duplicate_candidates(conn) {
        Ok(rows) => {
            let ids = schedule::find_duplicates(&rows);
            ok(
                &req.id,
                json!({ "scheduleIds": ids, "scanned": rows.len() }),
            )
        }
        Err(e) => query_failed(req, e),
    }
}

fn handle_cleanup_duplicates(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match db::load_duplicate_candidates(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let ids = schedule::find_duplicates(&rows);
    if ids.is_empty() {
        return ok(
            &req.id,
            json!({ "deleted": 0, "scheduleIds": [], "message": NO_DUPLICATES_MESSAGE }),
        );
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    for id in &ids {
        if let Err(e) = tx.execute("DELETE FROM teacher_subjects WHERE id = ?", [id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "teacher_subjects", "scheduleId": id })),
            );
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    let deleted = ids.len();
    tracing::info!(deleted, "duplicate schedules removed");
    ok(
        &req.id,
        json!({
            "deleted": deleted,
            "scheduleIds": ids,
            "message": format!("{} duplicate schedules removed", deleted),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.grouped" => Some(handle_schedules_grouped(state, req)),
        "dashboard.model" => Some(handle_dashboard_model(state, req)),
        "schedules.update" => Some(handle_schedules_update(state, req)),
        "schedules.delete" => Some(handle_schedules_delete(state, req)),
        "schedules.findDuplicates" => Some(handle_find_duplicates(state, req)),
        "schedules.cleanupDuplicates" => Some(handle_cleanup_duplicates(state, req)),
        _ => None,
    }
}
