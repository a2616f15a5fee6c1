use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_division_in, db_conn, now_rfc3339, optional_str, query_failed, required_str,
    required_uuid,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_prefects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "prefects": [] }));
    };
    match db::list_prefects(conn) {
        Ok(prefects) => {
            let rows: Vec<serde_json::Value> = prefects
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "lastName": p.last_name,
                        "firstName": p.first_name,
                        "displayName": p.display_name(),
                        "courseDivision": p.course_division(),
                        "createdAt": p.created_at,
                    })
                })
                .collect();
            ok(&req.id, json!({ "prefects": rows }))
        }
        Err(e) => query_failed(req, e),
    }
}

fn handle_prefects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let course_division = match course_division_in(req, &req.params, "courseDivision") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = optional_str(req, "userId");

    let prefect_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO prefects(id, last_name, first_name, course, division, created_at, user_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &prefect_id,
            &last_name,
            &first_name,
            &course_division.course,
            &course_division.division,
            now_rfc3339(),
            &user_id,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "prefects" })),
        );
    }

    ok(
        &req.id,
        json!({ "prefectId": prefect_id, "courseDivision": course_division }),
    )
}

fn handle_prefects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let prefect_id = match required_uuid(req, "prefectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM prefects WHERE id = ?", [&prefect_id]) {
        Ok(0) => err(&req.id, "not_found", "prefect not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "prefects" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "prefects.list" => Some(handle_prefects_list(state, req)),
        "prefects.create" => Some(handle_prefects_create(state, req)),
        "prefects.delete" => Some(handle_prefects_delete(state, req)),
        _ => None,
    }
}
