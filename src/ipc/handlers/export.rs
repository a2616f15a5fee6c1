use crate::db;
use crate::export::{self, ExportLayout};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, query_failed, required_uuid};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use rusqlite::Connection;
use serde_json::json;

pub const LAYOUT_KEY: &str = "export.layout";

/// Stored layout, or the defaults when nothing usable is stored.
pub fn load_layout(conn: &Connection) -> anyhow::Result<ExportLayout> {
    let Some(raw) = db::settings_get_json(conn, LAYOUT_KEY)? else {
        return Ok(ExportLayout::default());
    };
    match serde_json::from_value::<ExportLayout>(raw) {
        Ok(layout) => Ok(layout),
        Err(e) => {
            tracing::warn!(error = %e, "stored export layout unreadable; using defaults");
            Ok(ExportLayout::default())
        }
    }
}

fn handle_export_schedule(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let layout = match load_layout(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let rows = match db::load_resolved_assignments(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let title = optional_str(req, "title").unwrap_or_else(|| layout.title.clone());

    let groups = schedule::aggregate(&rows);
    let document = export::compose_schedule_document(&groups, &title);
    let html = export::render_html(&document);
    ok(
        &req.id,
        json!({ "document": document, "html": html, "layout": layout }),
    )
}

fn handle_export_prefect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let prefect_id = match required_uuid(req, "prefectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let prefect = match db::get_prefect(conn, &prefect_id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(&req.id, "not_found", "prefect not found", None),
        Err(e) => return query_failed(req, e),
    };
    let layout = match load_layout(conn) {
        Ok(v) => v.for_prefect(&prefect.course_division()),
        Err(e) => return query_failed(req, e),
    };
    let rows = match db::load_resolved_assignments(conn) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let title = optional_str(req, "title").unwrap_or_else(|| layout.title.clone());

    let groups = schedule::aggregate(&rows);
    match export::compose_prefect_document(&groups, &prefect, &title) {
        Ok(document) => {
            let html = export::render_html(&document);
            ok(
                &req.id,
                json!({ "document": document, "html": html, "layout": layout }),
            )
        }
        Err(e) => err(&req.id, e.code(), e.message(), Some(e.details())),
    }
}

fn handle_layout_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "layout": ExportLayout::default() }));
    };
    match load_layout(conn) {
        Ok(layout) => ok(&req.id, json!({ "layout": layout })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_layout_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("layout") else {
        return err(&req.id, "bad_params", "missing layout", None);
    };
    let layout: ExportLayout = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(msg) = layout.validate() {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, LAYOUT_KEY, &json!(layout)) {
        return err(
            &req.id,
            "db_update_failed",
            format!("{e:#}"),
            Some(json!({ "table": "settings" })),
        );
    }
    ok(&req.id, json!({ "layout": layout }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.schedule" => Some(handle_export_schedule(state, req)),
        "export.prefect" => Some(handle_export_prefect(state, req)),
        "settings.exportLayout.get" => Some(handle_layout_get(state, req)),
        "settings.exportLayout.set" => Some(handle_layout_set(state, req)),
        _ => None,
    }
}
