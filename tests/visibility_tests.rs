//! Visibility, profile and release tests

mod common;

use common::{component, setup_workspace, Workspace};
use predicates::prelude::*;

fn visible(ws: &Workspace, decorated: &str) -> bool {
    component(&ws.read_document(), decorated).unwrap()["visible"]
        .as_bool()
        .unwrap()
}

// ============================================================================
// Vis Tests
// ============================================================================

#[test]
fn test_vis_hide_rear() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args(["vis", "rear", "hide", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changed 3 components"));

    assert!(!visible(&ws, "CHAS_Push_REAR-1"));
    assert!(!visible(&ws, "RL_wheel_REAR-1"));
    assert!(visible(&ws, "CHAS_LowFor_FRONT-1"));
}

#[test]
fn test_vis_is_idempotent() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args(["vis", "wheels", "hide", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changed 4 components"));
    ws.hpt()
        .args(["vis", "wheels", "hide", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changed 0 components"));
}

#[test]
fn test_vis_chassis_and_nonchassis() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args(["vis", "chassis", "hide", "--no-progress"])
        .assert()
        .success();
    assert!(!visible(&ws, "CHAS_LowFor_FRONT-1"));
    assert!(!visible(&ws, "CHAS_Push_REAR-1"));
    assert!(visible(&ws, "UPRI_LowPnt_FRONT-1"));

    ws.hpt()
        .args(["vis", "nonchassis", "hide", "--no-progress"])
        .assert()
        .success();
    assert!(!visible(&ws, "UPRI_LowPnt_FRONT-1"));
    assert!(visible(&ws, "FL_wheel_FRONT-1"));
}

#[test]
fn test_vis_substring_needs_filter() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args(["vis", "substring", "hide", "--no-progress"])
        .assert()
        .failure();

    ws.hpt()
        .args(["vis", "substring", "hide", "tiepnt", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changed 1 components"));
    assert!(!visible(&ws, "CHAS_TiePnt_FRONT-1"));
}

#[test]
fn test_vis_unknown_target_fails() {
    let ws = setup_workspace();
    ws.hpt()
        .args(["vis", "sideways", "hide", "--no-progress"])
        .assert()
        .failure();
}

#[test]
fn test_vis_feature_hides_pose_folder() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args(["hardpoints", "pose", "--pose", "Static", "--no-progress"])
        .args(common::source_args())
        .assert()
        .success();
    ws.hpt()
        .args(["vis", "feature", "hide", "Static Transforms", "--no-progress"])
        .assert()
        .success();

    let doc = ws.read_document();
    let folder = doc["folders"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "Static Transforms")
        .unwrap();
    assert_eq!(folder["visible"], false);
}

// ============================================================================
// Profile Tests
// ============================================================================

#[test]
fn test_profile_save_list_show() {
    let ws = setup_workspace();
    ws.hpt()
        .args([
            "vis-profile",
            "save",
            "Front only",
            "--show",
            "front",
            "--hide",
            "rear",
            "--hide-matching",
            "TIEPNT",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved profile"));
    assert!(ws.profiles().join("Front only.json").exists());

    ws.hpt()
        .args(["vis-profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Front only"));

    ws.hpt()
        .args(["vis-profile", "show", "Front only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rear"))
        .stdout(predicate::str::contains("TIEPNT"));
}

#[test]
fn test_profile_apply() {
    let ws = setup_workspace();
    ws.insert_all();
    ws.hpt()
        .args([
            "vis-profile",
            "save",
            "Front only",
            "--show",
            "front",
            "--hide",
            "rear",
            "--hide-matching",
            "TIEPNT",
        ])
        .assert()
        .success();
    ws.hpt()
        .args(["vis-profile", "apply", "Front only", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied"));

    assert!(visible(&ws, "CHAS_LowFor_FRONT-1"));
    assert!(!visible(&ws, "CHAS_Push_REAR-1"));
    assert!(!visible(&ws, "CHAS_TiePnt_FRONT-1"));
}

#[test]
fn test_profile_rejects_unknown_target() {
    let ws = setup_workspace();
    ws.hpt()
        .args(["vis-profile", "save", "Odd", "--show", "sideways"])
        .assert()
        .failure();
    assert!(!ws.profiles().join("Odd.json").exists());
}

#[test]
fn test_profile_empty_is_rejected() {
    let ws = setup_workspace();
    ws.hpt()
        .args(["vis-profile", "save", "Nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("would be empty"));
}

#[test]
fn test_profile_apply_missing_fails() {
    let ws = setup_workspace();
    ws.hpt()
        .args(["vis-profile", "apply", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile not found"));
}

#[test]
fn test_profile_list_empty() {
    let ws = setup_workspace();
    ws.hpt()
        .args(["vis-profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles"));
}

// ============================================================================
// Release Tests
// ============================================================================

#[test]
fn test_release_clean_document() {
    let ws = setup_workspace();
    ws.hpt()
        .arg("release")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to release"));
}

#[test]
fn test_release_leaves_component_edit() {
    let ws = setup_workspace();
    ws.insert_all();

    // Simulate a run aborted inside a component edit
    let mut doc = ws.read_document();
    let id = doc["components"][0]["id"].clone();
    doc["editing"] = id;
    ws.write_document(&doc);

    ws.hpt()
        .arg("release")
        .assert()
        .success()
        .stdout(predicate::str::contains("left component edit"));
    assert!(ws.read_document()["editing"].is_null());

    ws.hpt()
        .arg("release")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to release"));
}

#[test]
fn test_insert_blocked_while_editing_until_release() {
    let ws = setup_workspace();
    ws.insert_all();
    let mut doc = ws.read_document();
    let id = doc["components"][0]["id"].clone();
    doc["editing"] = id;
    ws.write_document(&doc);

    ws.hpt()
        .args(["hardpoints", "addwheels", "--no-progress"])
        .args(common::source_args())
        .assert()
        .success()
        .stdout(predicate::str::contains("created 0 of 4"));

    ws.hpt().arg("release").assert().success();
    ws.hpt()
        .args(["hardpoints", "addwheels", "--no-progress"])
        .args(common::source_args())
        .assert()
        .success()
        .stdout(predicate::str::contains("created 4 of 4"));
}
