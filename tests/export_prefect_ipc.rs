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

fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

fn seed_schedule(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let subj = request_ok(
        stdin,
        reader,
        "seed-1",
        "subjects.create",
        json!({ "name": "Educación Física", "courseDivision": "2 I", "order": 1 }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "teachers.create",
        json!({
            "firstName": "Ana",
            "lastName": "Pérez",
            "schedules": [{
                "courseDivision": "2 I",
                "subjectId": subj["subjectId"],
                "day": "Miércoles",
                "startTime": "09:00",
                "endTime": "09:40",
                "genderTrack": "Mujeres"
            }]
        }),
    );
}

#[test]
fn full_export_lists_every_group_with_layout() {
    let workspace = temp_dir("horarios-export-all");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    seed_schedule(&mut stdin, &mut reader);

    let res = request_ok(&mut stdin, &mut reader, "1", "export.schedule", json!({}));
    let doc = &res["document"];
    assert_eq!(doc["title"], "Horarios de Atención a padres");
    assert!(doc.get("prefect").is_none());
    assert_eq!(doc["sections"][0]["heading"], "2 I");
    let row = &doc["sections"][0]["rows"][0];
    assert_eq!(row["teacher"], "Pérez, Ana");
    assert_eq!(row["subject"], "Educación Física (Mujeres)");
    assert_eq!(row["day"], "Miércoles");
    assert_eq!(row["timeRange"], "09:00 – 09:40");

    let html = res["html"].as_str().expect("html");
    assert!(html.contains("<h3 style=\"margin-top: 20px; color: #333;\">2 I</h3>"));
    assert!(html.contains("Educación Física (Mujeres)"));

    assert_eq!(res["layout"]["format"], "a4");
    assert_eq!(res["layout"]["filename"], "horarios-atencion.pdf");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn prefect_export_is_scoped_or_refused() {
    let workspace = temp_dir("horarios-export-prefect");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    seed_schedule(&mut stdin, &mut reader);

    let matching = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "prefects.create",
        json!({ "firstName": "Marta", "lastName": "Ruiz", "courseDivision": "2 I" }),
    );
    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "prefects.create",
        json!({ "firstName": "Jorge", "lastName": "Sosa", "courseDivision": "5 III" }),
    );

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "export.prefect",
        json!({ "prefectId": matching["prefectId"] }),
    );
    assert_eq!(res["document"]["prefect"]["name"], "Ruiz, Marta");
    assert_eq!(res["document"]["prefect"]["courseDivision"], "2 I");
    assert_eq!(res["document"]["sections"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(res["layout"]["filename"], "preceptores-2 I.pdf");
    assert!(res["html"].as_str().unwrap_or("").contains("Ruiz, Marta"));

    let refused = request(
        &mut stdin,
        &mut reader,
        "4",
        "export.prefect",
        json!({ "prefectId": empty["prefectId"] }),
    );
    assert_eq!(error_code(&refused), "no_assignments");
    assert_eq!(refused["error"]["details"]["courseDivision"], "5 III");

    let missing = request(
        &mut stdin,
        &mut reader,
        "5",
        "export.prefect",
        json!({ "prefectId": "00000000-0000-4000-8000-000000000000" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn export_layout_is_persisted_and_validated() {
    let workspace = temp_dir("horarios-export-layout");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let defaults = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "settings.exportLayout.get",
        json!({}),
    );
    assert_eq!(defaults["layout"]["orientation"], "portrait");
    assert_eq!(defaults["layout"]["marginMm"], 10.0);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "settings.exportLayout.set",
        json!({ "layout": { "orientation": "landscape", "title": "Consultas 2025" } }),
    );
    let rejected = request(
        &mut stdin,
        &mut reader,
        "3",
        "settings.exportLayout.set",
        json!({ "layout": { "orientation": "sideways" } }),
    );
    assert_eq!(error_code(&rejected), "bad_params");

    let stored = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "settings.exportLayout.get",
        json!({}),
    );
    assert_eq!(stored["layout"]["orientation"], "landscape");
    assert_eq!(stored["layout"]["format"], "a4");

    let exported = request_ok(&mut stdin, &mut reader, "5", "export.schedule", json!({}));
    assert_eq!(exported["document"]["title"], "Consultas 2025");
    assert_eq!(exported["document"]["sections"], json!([]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
