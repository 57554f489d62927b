// breakpoint_tests.rs: end-to-end breakpoint resolution through a DebugSession
//
// Every scenario drives a real session over a scripted runtime and on-disk
// compiled projects whose directories contain spaces.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::*;
use common::{assert_eq, assert_ne};
use serde_json::{json, Value};
use waypoint_engine::{
    BreakpointInfo, ClientEvent, ClientRequest, ClientResponse, DebugSession, EngineError,
    ExceptionKind, FrameId, LaunchPhase, PauseCause, Runtime, RuntimeError, RuntimeEvent, Source,
    SourceBreakpoint, StopReason,
};

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn launch(session: &mut DebugSession<ScriptedRuntime>, arguments: Value) -> PathBuf {
    match session
        .handle_request(ClientRequest::Launch(arguments))
        .expect("launch")
    {
        ClientResponse::Launch { program } => program,
        other => panic!("unexpected response: {:?}", other),
    }
}

fn set_breakpoints(
    session: &mut DebugSession<ScriptedRuntime>,
    path: &Path,
    breakpoints: Vec<SourceBreakpoint>,
) -> Vec<BreakpointInfo> {
    match session
        .handle_request(ClientRequest::SetBreakpoints {
            source: Source::new(path),
            breakpoints,
        })
        .expect("setBreakpoints")
    {
        ClientResponse::SetBreakpoints { breakpoints } => breakpoints,
        other => panic!("unexpected response: {:?}", other),
    }
}

fn configuration_done(session: &mut DebugSession<ScriptedRuntime>) {
    session
        .handle_request(ClientRequest::ConfigurationDone)
        .expect("configurationDone");
}

fn script_loaded(session: &mut DebugSession<ScriptedRuntime>, path: &Path) {
    session
        .handle_runtime_event(RuntimeEvent::ScriptLoaded {
            path: path.to_path_buf(),
        })
        .expect("scriptLoaded");
}

fn paused(session: &mut DebugSession<ScriptedRuntime>, path: &Path, line: u32, column: Option<u32>, cause: PauseCause) {
    session
        .handle_runtime_event(RuntimeEvent::PausedAt {
            path: path.to_path_buf(),
            line,
            column,
            frame: FrameId(1),
            cause,
        })
        .expect("pausedAt");
}

fn hit(session: &mut DebugSession<ScriptedRuntime>, path: &Path, line: u32, column: Option<u32>) {
    paused(session, path, line, column, PauseCause::Breakpoint);
}

fn throw(session: &mut DebugSession<ScriptedRuntime>, path: &Path, kind: ExceptionKind) {
    session
        .handle_runtime_event(RuntimeEvent::ExceptionThrown {
            kind,
            path: path.to_path_buf(),
            line: 3,
            column: Some(5),
            frame: FrameId(1),
            description: Some("Error: boom".to_string()),
        })
        .expect("exceptionThrown");
}

fn stop_reasons(events: &[ClientEvent]) -> Vec<StopReason> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Stopped { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

fn outputs(events: &[ClientEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Output { output, .. } => Some(output.clone()),
            _ => None,
        })
        .collect()
}

/// Session launched on `classes.js` with source maps on and no search roots.
fn classes_session(project: &Project, style: MapStyle) -> (DebugSession<ScriptedRuntime>, PathBuf) {
    let js = project.compile("classes", CLASSES, style);
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    session.drain_events();
    (session, js)
}

// ═══════════════════════════════════════════════════════════════════════════
// Plain JavaScript
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_source_maps_off_verifies_immediately() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(4)]);
    assert_eq!(infos.len(), 1);
    assert!(infos[0].verified);
    assert_eq!(infos[0].line, 4);
    assert_eq!(infos[0].source.path, js);
    assert_eq!(log.lock().live_breakpoints(), vec![(js.clone(), 4)]);
    assert!(breakpoint_changes(&session.drain_events()).is_empty());
}

#[test]
fn test_breakpoints_before_launch_verify_at_launch() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2)]);
    assert!(!infos[0].verified);
    assert!(log.lock().installed.is_empty());

    launch(&mut session, json!({ "program": path_str(&js) }));
    let events = session.drain_events();
    assert_eq!(breakpoint_changes(&events), vec![(infos[0].id, true, 2)]);
    assert_eq!(events.last(), Some(&ClientEvent::Initialized));
    assert_eq!(log.lock().live_breakpoints(), vec![(js, 2)]);
}

#[test]
fn test_duplicate_positions_share_one_breakpoint() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));

    let infos = set_breakpoints(
        &mut session,
        &js,
        vec![SourceBreakpoint::at(7), SourceBreakpoint::at(7), SourceBreakpoint::at(9)],
    );
    assert_eq!(infos.len(), 3);
    assert_eq!(infos[0].id, infos[1].id);
    assert_ne!(infos[0].id, infos[2].id);
    assert_eq!(log.lock().installed.len(), 2);
}

#[test]
fn test_runtime_adjusted_location_is_reported() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new().moving_line(4, 6));
    launch(&mut session, json!({ "program": path_str(&js) }));
    configuration_done(&mut session);

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(4)]);
    assert!(infos[0].verified);
    assert_eq!(infos[0].line, 6);

    session.drain_events();
    hit(&mut session, &js, 6, Some(1));
    assert_eq!(stops(&session.drain_events()), vec![(js, 6)]);
}

#[test]
fn test_refused_install_rejects_breakpoint() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new().refusing_line(4));
    launch(&mut session, json!({ "program": path_str(&js) }));

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(4), SourceBreakpoint::at(5)]);
    assert!(!infos[0].verified);
    assert_eq!(infos[0].message.as_deref(), Some("no executable code on line 4"));
    assert!(infos[1].verified);
}

// ═══════════════════════════════════════════════════════════════════════════
// Late verification
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_late_map_load_sends_exactly_one_change() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");

    let infos = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17)]);
    assert!(!infos[0].verified);
    assert_eq!(infos[0].line, 17);
    assert!(session.drain_events().is_empty());

    script_loaded(&mut session, &js);
    let events = session.drain_events();
    assert_eq!(breakpoint_changes(&events), vec![(infos[0].id, true, 17)]);

    // The same script again changes nothing.
    script_loaded(&mut session, &js);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_late_verification_installs_generated_location() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Inline);
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    let ts = project.src("classes.ts");

    set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(3), SourceBreakpoint::at(17)]);
    assert!(log.lock().installed.is_empty());

    script_loaded(&mut session, &js);
    let installed: Vec<(u32, Option<u32>)> = log
        .lock()
        .installed
        .iter()
        .map(|(_, loc)| (loc.line(), loc.column()))
        .collect();
    assert_eq!(installed, vec![(5, Some(5)), (21, Some(9))]);
}

#[test]
fn test_sibling_map_without_comment() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Sibling);
    let ts = project.src("classes.ts");

    let infos = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(16)]);
    script_loaded(&mut session, &js);
    assert_eq!(
        breakpoint_changes(&session.drain_events()),
        vec![(infos[0].id, true, 16)]
    );
}

#[test]
fn test_line_without_code_binds_to_next_mapped_line() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");

    let infos = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(10)]);
    script_loaded(&mut session, &js);
    assert_eq!(
        breakpoint_changes(&session.drain_events()),
        vec![(infos[0].id, true, 16)]
    );
}

#[test]
fn test_line_past_last_mapping_is_rejected() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");

    let infos = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(40)]);
    script_loaded(&mut session, &js);
    let events = session.drain_events();
    assert_eq!(breakpoint_changes(&events), vec![(infos[0].id, false, 40)]);
    match &events[0] {
        ClientEvent::BreakpointChanged { breakpoint } => assert_eq!(
            breakpoint.message.as_deref(),
            Some("no generated code at or after line 40")
        ),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_breakpoints_set_after_map_loaded_verify_immediately() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    script_loaded(&mut session, &js);

    let infos = set_breakpoints(&mut session, &project.src("classes.ts"), vec![SourceBreakpoint::at(17)]);
    assert!(infos[0].verified);
    assert_eq!(infos[0].line, 17);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_runtime_adjusted_location_maps_back_to_original() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Referenced);
    let mut session = DebugSession::new(ScriptedRuntime::new().moving_line(21, 25));
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    let ts = project.src("classes.ts");

    let infos = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17)]);
    script_loaded(&mut session, &js);
    assert_eq!(
        breakpoint_changes(&session.drain_events()),
        vec![(infos[0].id, true, 21)]
    );
}

#[test]
fn test_loading_complete_rejects_pending() {
    let project = Project::new();
    let (mut session, _js) = classes_session(&project, MapStyle::Referenced);
    let orphan = project.src("orphan.ts");

    let infos = set_breakpoints(&mut session, &orphan, vec![SourceBreakpoint::at(2)]);
    assert!(!infos[0].verified);
    assert!(infos[0].message.is_none());

    session
        .handle_runtime_event(RuntimeEvent::LoadingComplete)
        .unwrap();
    let events = session.drain_events();
    assert_eq!(breakpoint_changes(&events), vec![(infos[0].id, false, 2)]);
    match &events[0] {
        ClientEvent::BreakpointChanged { breakpoint } => {
            assert_eq!(breakpoint.message.as_deref(), Some("no source map found for this file"))
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_breakpoint_in_generated_file_with_source_maps_on() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(21)]);
    assert!(infos[0].verified);
    assert_eq!(infos[0].source.path, js);
}

#[test]
fn test_breakpoints_in_both_generated_and_original_file() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");
    configuration_done(&mut session);

    let in_js = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(21)]);
    let in_ts = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17)]);
    assert!(in_js[0].verified);
    script_loaded(&mut session, &js);
    session.drain_events();

    hit(&mut session, &js, 21, Some(9));
    let events = session.drain_events();
    assert_eq!(stops(&events), vec![(ts, 17)]);
    match &events[..] {
        [ClientEvent::Stopped { reason, hit_breakpoint_ids, .. }] => {
            assert_eq!(*reason, StopReason::Breakpoint);
            let mut expected = vec![in_js[0].id, in_ts[0].id];
            expected.sort_unstable();
            assert_eq!(hit_breakpoint_ids, &expected);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Search roots
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_out_dir_map_verifies_at_set_time() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::OutDirOnly);
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(
        &mut session,
        json!({
            "program": path_str(&js),
            "sourceMaps": true,
            "outDir": path_str(&project.out_dir()),
        }),
    );

    let infos = set_breakpoints(&mut session, &project.src("classes.ts"), vec![SourceBreakpoint::at(17)]);
    assert!(infos[0].verified);
    assert_eq!(infos[0].line, 17);
    assert_eq!(log.lock().live_breakpoints(), vec![(js, 21)]);
}

#[test]
fn test_out_files_glob_with_spaces() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::OutDirOnly);
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(
        &mut session,
        json!({
            "program": path_str(&js),
            "sourceMaps": true,
            "outFiles": [format!("{}/**/*.js", path_str(&project.out_dir()))],
        }),
    );

    let infos = set_breakpoints(&mut session, &project.src("classes.ts"), vec![SourceBreakpoint::at(3)]);
    assert!(infos[0].verified);
    assert_eq!(infos[0].line, 3);
}

#[test]
fn test_launch_original_program_runs_generated_file() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Referenced);
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);

    let program = launch(
        &mut session,
        json!({
            "program": path_str(&project.src("classes.ts")),
            "sourceMaps": true,
            "outDir": path_str(&project.out_dir()),
        }),
    );
    assert_eq!(program, js);
    assert_eq!(log.lock().launched[0].program, js);
}

// ═══════════════════════════════════════════════════════════════════════════
// Replacing breakpoints
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_replace_removes_and_never_fires_old() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Referenced);
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    configuration_done(&mut session);
    script_loaded(&mut session, &js);
    let ts = project.src("classes.ts");

    let first = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(3), SourceBreakpoint::at(17)]);
    let second = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17)]);
    assert_eq!(second[0].id, first[1].id);
    assert_eq!(log.lock().removed.len(), 1);
    assert_eq!(log.lock().live_breakpoints(), vec![(js.clone(), 21)]);
    session.drain_events();

    hit(&mut session, &js, 5, Some(5));
    let events = session.drain_events();
    assert!(stops(&events).is_empty());
    assert_eq!(log.lock().resumes, 2);

    hit(&mut session, &js, 21, Some(9));
    assert_eq!(stops(&session.drain_events()), vec![(ts, 17)]);
}

#[test]
fn test_identical_replace_is_idempotent() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));
    session.drain_events();

    let first = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2), SourceBreakpoint::at(3)]);
    let second = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2), SourceBreakpoint::at(3)]);
    assert_eq!(first, second);
    assert_eq!(log.lock().installed.len(), 2);
    assert!(log.lock().removed.is_empty());
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_empty_set_clears_file() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));

    set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2)]);
    let infos = set_breakpoints(&mut session, &js, Vec::new());
    assert!(infos.is_empty());
    assert!(log.lock().live_breakpoints().is_empty());
    assert_eq!(session.state().registry.count(), 0);
}

#[test]
fn test_stale_script_load_result_is_discarded() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");

    let first = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(3)]);
    let job = session.prepare_script_load(&js).expect("job");
    let outcome = job.run();

    // Replaced while the job was running; the map is cached by now.
    let replaced = set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17)]);
    assert!(replaced[0].verified);
    session.drain_events();

    session.apply_script_load(outcome).unwrap();
    assert!(session.drain_events().is_empty());
    assert!(session.state().registry.get(first[0].id).is_none());
    assert_eq!(session.state().registry.count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Conditions, hit counts and log points
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_condition_stops_once() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Referenced);
    let iteration = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&iteration);
    let runtime = ScriptedRuntime::new().with_evaluator(move |expr, _| match expr {
        "i === 3" => Ok(json!(seen.fetch_add(1, Ordering::SeqCst) + 1 == 3)),
        "x" => Ok(json!(9)),
        other => Err(RuntimeError::Evaluation(format!("{} is not defined", other))),
    });
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    configuration_done(&mut session);
    script_loaded(&mut session, &js);
    let ts = project.src("classes.ts");

    set_breakpoints(&mut session, &ts, vec![SourceBreakpoint::at(17).with_condition("i === 3")]);
    session.drain_events();

    for _ in 0..5 {
        hit(&mut session, &js, 21, Some(9));
    }
    assert_eq!(stops(&session.drain_events()), vec![(ts, 17)]);
    assert_eq!(iteration.load(Ordering::SeqCst), 5);
    assert_eq!(
        session.runtime_mut().evaluate("x", FrameId(1)).unwrap(),
        json!(9)
    );
}

#[test]
fn test_condition_error_counts_as_false() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));
    configuration_done(&mut session);

    set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2).with_condition("missing.value")]);
    session.drain_events();
    hit(&mut session, &js, 2, None);
    assert!(stops(&session.drain_events()).is_empty());
    assert!(!session.is_terminated());
}

#[test]
fn test_hit_condition_modulo() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));
    configuration_done(&mut session);

    set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2).with_hit_condition("% 2")]);
    session.drain_events();

    let mut stopped = Vec::new();
    for n in 1..=5 {
        hit(&mut session, &js, 2, None);
        if !stops(&session.drain_events()).is_empty() {
            stopped.push(n);
        }
    }
    assert_eq!(stopped, vec![2, 4]);
}

#[test]
fn test_bare_hit_condition_is_at_least() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));
    configuration_done(&mut session);

    set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2).with_hit_condition("3")]);
    session.drain_events();

    let mut stopped = Vec::new();
    for n in 1..=4 {
        hit(&mut session, &js, 2, None);
        if !stops(&session.drain_events()).is_empty() {
            stopped.push(n);
        }
    }
    assert_eq!(stopped, vec![3, 4]);
}

#[test]
fn test_invalid_hit_condition_is_rejected() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));

    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(2).with_hit_condition("% 0")]);
    assert!(!infos[0].verified);
    assert!(infos[0].message.is_some());
}

#[test]
fn test_log_point_outputs_without_stopping() {
    let project = Project::new();
    let js = project.compile("classes", CLASSES, MapStyle::Referenced);
    let runtime = ScriptedRuntime::new().with_evaluator(|expr, _| match expr {
        "x" => Ok(json!(9)),
        "name" => Ok(json!("point")),
        other => Err(RuntimeError::Evaluation(format!("{} is not defined", other))),
    });
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js), "sourceMaps": true }));
    configuration_done(&mut session);
    script_loaded(&mut session, &js);

    set_breakpoints(
        &mut session,
        &project.src("classes.ts"),
        vec![SourceBreakpoint::at(17).with_log_message("x is {x} at {name}")],
    );
    session.drain_events();

    hit(&mut session, &js, 21, Some(9));
    let events = session.drain_events();
    assert!(stops(&events).is_empty());
    assert_eq!(outputs(&events), vec!["x is 9 at point\n".to_string()]);
    assert_eq!(log.lock().resumes, 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// Exceptions
// ═══════════════════════════════════════════════════════════════════════════

fn exception_session(filters: &[&str]) -> (DebugSession<ScriptedRuntime>, PathBuf, Project) {
    let project = Project::new();
    let js = project.plain_js("throws.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));
    let response = session
        .handle_request(ClientRequest::SetExceptionBreakpoints {
            filters: filters.iter().map(|f| f.to_string()).collect(),
        })
        .unwrap();
    assert_eq!(
        response,
        ClientResponse::SetExceptionBreakpoints {
            accepted: filters.iter().map(|f| f.to_string()).collect()
        }
    );
    configuration_done(&mut session);
    session.drain_events();
    (session, js, project)
}

#[test]
fn test_all_exceptions_filter_stops_on_caught() {
    let (mut session, js, _project) = exception_session(&["all"]);
    throw(&mut session, &js, ExceptionKind::Caught);
    let events = session.drain_events();
    assert_eq!(stop_reasons(&events), vec![StopReason::Exception]);
    assert_eq!(stops(&events), vec![(js, 3)]);
}

#[test]
fn test_uncaught_filter_ignores_caught() {
    let (mut session, js, _project) = exception_session(&["uncaught"]);
    throw(&mut session, &js, ExceptionKind::Caught);
    assert!(stops(&session.drain_events()).is_empty());

    throw(&mut session, &js, ExceptionKind::Uncaught);
    assert_eq!(stop_reasons(&session.drain_events()), vec![StopReason::Exception]);
}

#[test]
fn test_no_filters_runs_to_completion() {
    let (mut session, js, _project) = exception_session(&[]);
    throw(&mut session, &js, ExceptionKind::Caught);
    throw(&mut session, &js, ExceptionKind::Uncaught);
    session
        .handle_runtime_event(RuntimeEvent::Exited { exit_code: Some(1) })
        .unwrap();

    let events = session.drain_events();
    assert!(stops(&events).is_empty());
    assert_eq!(events, vec![ClientEvent::Terminated]);
    assert!(session.is_terminated());
}

#[test]
fn test_exception_location_maps_to_original() {
    let project = Project::new();
    let (mut session, js) = classes_session(&project, MapStyle::Referenced);
    let ts = project.src("classes.ts");
    session
        .handle_request(ClientRequest::SetExceptionBreakpoints {
            filters: vec!["uncaught".to_string()],
        })
        .unwrap();
    configuration_done(&mut session);
    script_loaded(&mut session, &js);
    set_breakpoints(&mut session, &ts, Vec::new());
    session.drain_events();

    session
        .handle_runtime_event(RuntimeEvent::ExceptionThrown {
            kind: ExceptionKind::Uncaught,
            path: js.clone(),
            line: 21,
            column: Some(9),
            frame: FrameId(1),
            description: None,
        })
        .unwrap();
    assert_eq!(stops(&session.drain_events()), vec![(ts, 17)]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_breakpoint_on_entry_line_reports_breakpoint() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));

    paused(&mut session, &js, 1, Some(1), PauseCause::Entry);
    let infos = set_breakpoints(&mut session, &js, vec![SourceBreakpoint::at(1)]);
    session.drain_events();

    configuration_done(&mut session);
    let events = session.drain_events();
    assert_eq!(stop_reasons(&events), vec![StopReason::Breakpoint]);
    match &events[0] {
        ClientEvent::Stopped { hit_breakpoint_ids, .. } => {
            assert_eq!(hit_breakpoint_ids, &vec![infos[0].id])
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(log.lock().resumes, 0);
}

#[test]
fn test_stop_on_entry_reports_entry() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js), "stopOnEntry": true }));

    paused(&mut session, &js, 1, Some(1), PauseCause::Entry);
    assert!(stops(&session.drain_events()).is_empty());
    assert_eq!(session.phase(), LaunchPhase::Launched);

    configuration_done(&mut session);
    assert_eq!(stop_reasons(&session.drain_events()), vec![StopReason::Entry]);
    assert_eq!(session.phase(), LaunchPhase::Running);
}

#[test]
fn test_entry_pause_is_hidden_without_stop_on_entry() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));

    paused(&mut session, &js, 1, Some(1), PauseCause::Entry);
    configuration_done(&mut session);
    assert!(stops(&session.drain_events()).is_empty());
    assert_eq!(log.lock().resumes, 1);
}

#[test]
fn test_configuration_done_resumes_without_entry_pause() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js), "stopOnEntry": true }));

    configuration_done(&mut session);
    assert_eq!(log.lock().resumes, 1);

    // An entry pause arriving late is handled at once.
    paused(&mut session, &js, 1, None, PauseCause::Entry);
    assert_eq!(stop_reasons(&session.drain_events()), vec![StopReason::Entry]);
}

#[test]
fn test_debugger_statement_reports_pause() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let mut session = DebugSession::new(ScriptedRuntime::new());
    launch(&mut session, json!({ "program": path_str(&js) }));
    configuration_done(&mut session);
    session.drain_events();

    paused(&mut session, &js, 8, None, PauseCause::Other);
    assert_eq!(stop_reasons(&session.drain_events()), vec![StopReason::Pause]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_configuration_done_before_launch_is_invalid() {
    let mut session = DebugSession::new(ScriptedRuntime::new());
    let err = session
        .handle_request(ClientRequest::ConfigurationDone)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPhase { .. }));
}

#[test]
fn test_disconnect_terminates_runtime() {
    let project = Project::new();
    let js = project.plain_js("app.js");
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    launch(&mut session, json!({ "program": path_str(&js) }));
    session.drain_events();

    session.handle_request(ClientRequest::Disconnect).unwrap();
    assert!(log.lock().terminated);
    assert_eq!(session.drain_events(), vec![ClientEvent::Terminated]);
    assert!(matches!(
        session.handle_request(ClientRequest::ConfigurationDone),
        Err(EngineError::SessionClosed)
    ));
}

#[test]
fn test_disconnect_before_launch_does_not_touch_runtime() {
    let runtime = ScriptedRuntime::new();
    let log = runtime.log();
    let mut session = DebugSession::new(runtime);
    session.handle_request(ClientRequest::Disconnect).unwrap();
    assert!(!log.lock().terminated);
    assert!(session.is_terminated());
}

#[test]
fn test_session_end_rejects_pending_breakpoints() {
    let project = Project::new();
    let (mut session, _js) = classes_session(&project, MapStyle::Referenced);
    let infos = set_breakpoints(&mut session, &project.src("classes.ts"), vec![SourceBreakpoint::at(3)]);

    session.handle_request(ClientRequest::Disconnect).unwrap();
    let events = session.drain_events();
    assert_eq!(breakpoint_changes(&events), vec![(infos[0].id, false, 3)]);
    assert_eq!(events.last(), Some(&ClientEvent::Terminated));
}
