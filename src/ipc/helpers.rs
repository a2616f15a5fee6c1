use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{CourseDivision, GenderTrack, Weekday};
use chrono::NaiveTime;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

pub type HandlerResult<T> = Result<T, serde_json::Value>;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> HandlerResult<&'a Connection> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn bad_params(req: &Request, message: impl Into<String>) -> serde_json::Value {
    err(&req.id, "bad_params", message, None)
}

pub fn query_failed(req: &Request, e: anyhow::Error) -> serde_json::Value {
    err(&req.id, "db_query_failed", format!("{e:#}"), None)
}

fn str_in<'a>(obj: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

pub fn required_str(req: &Request, key: &str) -> HandlerResult<String> {
    required_str_in(req, &req.params, key)
}

/// Trimmed, non-empty string field of `obj`.
pub fn required_str_in(req: &Request, obj: &serde_json::Value, key: &str) -> HandlerResult<String> {
    let Some(v) = str_in(obj, key) else {
        return Err(bad_params(req, format!("missing {}", key)));
    };
    let v = v.trim();
    if v.is_empty() {
        return Err(bad_params(req, format!("{} must not be empty", key)));
    }
    Ok(v.to_string())
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    str_in(&req.params, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_uuid_in(req: &Request, obj: &serde_json::Value, key: &str) -> HandlerResult<String> {
    let raw = required_str_in(req, obj, key)?;
    match Uuid::parse_str(&raw) {
        Ok(u) => Ok(u.to_string()),
        Err(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} is not a valid id", key),
            Some(json!({ key: raw })),
        )),
    }
}

pub fn required_uuid(req: &Request, key: &str) -> HandlerResult<String> {
    required_uuid_in(req, &req.params, key)
}

/// A course/division from the canonical list, given as `"1 I"`.
pub fn course_division_in(
    req: &Request,
    obj: &serde_json::Value,
    key: &str,
) -> HandlerResult<CourseDivision> {
    let raw = required_str_in(req, obj, key)?;
    match CourseDivision::parse(&raw) {
        Some(cd) if cd.is_canonical() => Ok(cd),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be one of the known course/divisions", key),
            Some(json!({ key: raw })),
        )),
    }
}

pub fn weekday_in(req: &Request, obj: &serde_json::Value, key: &str) -> HandlerResult<Weekday> {
    let raw = required_str_in(req, obj, key)?;
    Weekday::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "day must be one of: Lunes, Martes, Miércoles, Jueves, Viernes",
            Some(json!({ key: raw })),
        )
    })
}

/// Normalises `HH:MM` or `HH:MM:SS` to `HH:MM`.
pub fn time_in(req: &Request, obj: &serde_json::Value, key: &str) -> HandlerResult<NaiveTime> {
    let raw = required_str_in(req, obj, key)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(|_| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a time as HH:MM", key),
                Some(json!({ key: raw })),
            )
        })
}

pub fn time_window_in(
    req: &Request,
    obj: &serde_json::Value,
) -> HandlerResult<(String, String)> {
    let start = time_in(req, obj, "startTime")?;
    let end = time_in(req, obj, "endTime")?;
    if start >= end {
        return Err(err(
            &req.id,
            "bad_params",
            "startTime must be before endTime",
            Some(json!({
                "startTime": start.format("%H:%M").to_string(),
                "endTime": end.format("%H:%M").to_string(),
            })),
        ));
    }
    Ok((
        start.format("%H:%M").to_string(),
        end.format("%H:%M").to_string(),
    ))
}

pub fn gender_track_in(
    req: &Request,
    obj: &serde_json::Value,
    key: &str,
) -> HandlerResult<Option<GenderTrack>> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_str().and_then(GenderTrack::parse).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "genderTrack must be one of: Varones, Mujeres",
                Some(json!({ key: v })),
            )
        }),
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
