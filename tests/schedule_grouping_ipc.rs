use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_horariosd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn horariosd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected error: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

fn create_subject(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    course_division: &str,
    order: Option<i64>,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "subjects.create",
        json!({ "name": name, "courseDivision": course_division, "order": order }),
    );
    res.get("subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId")
        .to_string()
}

fn schedule(course_division: &str, subject_id: &str, day: &str) -> serde_json::Value {
    json!({
        "courseDivision": course_division,
        "subjectId": subject_id,
        "day": day,
        "startTime": "08:00",
        "endTime": "09:00",
    })
}

fn group_keys(groups: &serde_json::Value) -> Vec<String> {
    groups
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|g| {
            g.get("courseDivision")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        })
        .collect()
}

fn labels(group: &serde_json::Value) -> Vec<String> {
    group
        .get("assignments")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|a| {
            a.get("subjectLabel")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        })
        .collect()
}

#[test]
fn grouped_schedules_follow_canonical_and_display_order() {
    let workspace = temp_dir("horarios-grouping");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let math = create_subject(&mut stdin, &mut reader, "2", "Matemática", "1 I", Some(2));
    let art = create_subject(&mut stdin, &mut reader, "3", "Arte", "1 I", Some(1));
    let pe = create_subject(&mut stdin, &mut reader, "4", "Educación Física", "1 I", Some(3));
    let history = create_subject(&mut stdin, &mut reader, "5", "Historia", "6 III", Some(1));
    let bio = create_subject(&mut stdin, &mut reader, "6", "Biología", "2 II", None);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "teachers.create",
        json!({
            "firstName": "Ana",
            "lastName": "Pérez",
            "schedules": [
                schedule("6 III", &history, "Lunes"),
                schedule("1 I", &math, "Martes"),
                {
                    "courseDivision": "1 I",
                    "subjectId": pe,
                    "day": "Jueves",
                    "startTime": "10:00",
                    "endTime": "11:00",
                    "genderTrack": "Mujeres"
                },
            ]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "teachers.create",
        json!({
            "firstName": "Luis",
            "lastName": "Gómez",
            "schedules": [
                schedule("1 I", &art, "Miércoles"),
                schedule("2 II", &bio, "Viernes"),
                {
                    "courseDivision": "1 I",
                    "subjectId": math,
                    "day": "Lunes",
                    "startTime": "13:00",
                    "endTime": "14:00",
                    "genderTrack": "Varones"
                },
            ]
        }),
    );

    let grouped = request_ok(&mut stdin, &mut reader, "9", "schedules.grouped", json!({}));
    let groups = grouped.get("groups").cloned().expect("groups");
    assert_eq!(group_keys(&groups), vec!["1 I", "2 II", "6 III"]);

    let first = &groups[0];
    let first_labels = labels(first);
    assert_eq!(first_labels.len(), 4);
    assert_eq!(first_labels[0], "Arte");
    assert_eq!(first_labels[1], "Matemática");
    assert_eq!(first_labels[2], "Matemática");
    assert_eq!(first_labels[3], "Educación Física (Mujeres)");

    let dashboard = request_ok(&mut stdin, &mut reader, "10", "dashboard.model", json!({}));
    let teachers = dashboard
        .get("teachers")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("teachers");
    assert_eq!(teachers.len(), 2);
    // Newest teacher first.
    assert_eq!(
        teachers[0]
            .get("teacher")
            .and_then(|t| t.get("lastName"))
            .and_then(|v| v.as_str()),
        Some("Gómez")
    );
    let gomez_groups = teachers[0].get("groups").cloned().expect("groups");
    assert_eq!(group_keys(&gomez_groups), vec!["1 I", "2 II"]);
    let perez_groups = teachers[1].get("groups").cloned().expect("groups");
    assert_eq!(group_keys(&perez_groups), vec!["1 I", "6 III"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn gender_track_defaults_for_flagged_subject_and_is_dropped_elsewhere() {
    let workspace = temp_dir("horarios-gender-track");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let pe = create_subject(&mut stdin, &mut reader, "2", "Educación Física", "3 II", Some(1));
    let math = create_subject(&mut stdin, &mut reader, "3", "Matemática", "3 II", Some(2));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "teachers.create",
        json!({
            "firstName": "Sara",
            "lastName": "Díaz",
            "schedules": [
                schedule("3 II", &pe, "Lunes"),
                {
                    "courseDivision": "3 II",
                    "subjectId": math,
                    "day": "Martes",
                    "startTime": "08:00",
                    "endTime": "09:00",
                    "genderTrack": "Mujeres"
                },
            ]
        }),
    );

    let grouped = request_ok(&mut stdin, &mut reader, "5", "schedules.grouped", json!({}));
    let groups = grouped.get("groups").cloned().expect("groups");
    assert_eq!(
        labels(&groups[0]),
        vec!["Educación Física (Varones)", "Matemática"]
    );
    let math_row = &groups[0]["assignments"][1];
    assert!(math_row.get("genderTrack").map(|v| v.is_null()).unwrap_or(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grouping_without_workspace_or_rows_is_empty() {
    let workspace = temp_dir("horarios-grouping-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "schedules.grouped", json!({}));
    assert_eq!(before.get("groups"), Some(&json!([])));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let after = request_ok(&mut stdin, &mut reader, "3", "schedules.grouped", json!({}));
    assert_eq!(after.get("groups"), Some(&json!([])));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
