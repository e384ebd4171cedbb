mod common;

use std::time::Duration;

use common::NaviCueProcess;

#[tokio::test(flavor = "multi_thread")]
async fn timed_cue_completes_after_input_closes() {
    let mut proc = NaviCueProcess::spawn_run("command_center.yaml", "quick-glance");
    proc.close_input();

    let started = proc.expect_event("CueStarted").await;
    assert_eq!(started["stage"], "arriving");
    assert_eq!(started["sequence"], 0);

    let first = proc.expect_event("StageEntered").await;
    assert_eq!(first["from"], "arriving");
    assert_eq!(first["to"], "active");
    assert_eq!(first["cause"], "timer");

    let second = proc.expect_event("StageEntered").await;
    assert_eq!(second["to"], "afterglow");

    let completed = proc.expect_event("CueCompleted").await;
    assert!(completed["duration_ms"].as_u64().is_some_and(|ms| ms >= 400));

    assert_eq!(proc.wait().await, Some(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn gated_cue_follows_actions() {
    let mut proc = NaviCueProcess::spawn_run("command_center.yaml", "boundary-breath");

    proc.expect_event("CueStarted").await;

    // An action from a stage the cue has not reached is rejected
    proc.send_action("tap").await;
    let rejected = proc.expect_event("GateRejected").await;
    assert_eq!(rejected["action"], "tap");
    assert_eq!(rejected["stage"], "arriving");

    let active = proc.expect_event("StageEntered").await;
    assert_eq!(active["to"], "active");
    assert_eq!(active["actions"], serde_json::json!(["tap", "skip"]));

    proc.send_action("tap").await;
    let resonant = proc.expect_event("StageEntered").await;
    assert_eq!(resonant["to"], "resonant");
    assert_eq!(resonant["cause"], "gate");

    let afterglow = proc.expect_event("StageEntered").await;
    assert_eq!(afterglow["to"], "afterglow");
    assert_eq!(afterglow["cause"], "timer");

    proc.expect_event("CueCompleted").await;
    assert_eq!(proc.wait().await, Some(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_goes_straight_to_afterglow() {
    let mut proc = NaviCueProcess::spawn_run("command_center.yaml", "boundary-breath");

    proc.expect_event("CueStarted").await;
    proc.expect_event("StageEntered").await;

    proc.send_action("skip").await;
    let afterglow = proc.expect_event("StageEntered").await;
    assert_eq!(afterglow["from"], "active");
    assert_eq!(afterglow["to"], "afterglow");

    proc.expect_event("CueCompleted").await;
    assert_eq!(proc.wait().await, Some(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn stuck_cue_is_disposed_on_eof() {
    let mut proc = NaviCueProcess::spawn_run("command_center.yaml", "boundary-breath");

    proc.expect_event("CueStarted").await;
    proc.expect_event("StageEntered").await;

    // `active` only leaves through a gate, so EOF leaves nothing to wait for
    proc.close_input();
    let disposed = proc.read_event(Duration::from_secs(5)).await;
    assert_eq!(disposed["type"], "CueDisposed");
    assert_eq!(disposed["stage"], "active");

    assert_eq!(proc.wait().await, Some(0));
}
