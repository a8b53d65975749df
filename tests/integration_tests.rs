//! Integration tests for the ntk CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get an ntk command with a fixed author and no global config
fn ntk() -> Command {
    let mut cmd = Command::cargo_bin("ntk").unwrap();
    cmd.env("NTK_AUTHOR", "tester")
        .env_remove("NTK_WORKSPACE")
        .env_remove("NTK_STORE")
        .env_remove("NTK_LOG");
    cmd
}

/// Helper to create a workspace in a temp directory
fn setup_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    ntk().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Run a command in the workspace and return trimmed stdout
fn stdout_of(tmp: &TempDir, args: &[&str]) -> String {
    let output = ntk().current_dir(tmp.path()).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "ntk {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a template and return its full ID
fn create_template(tmp: &TempDir, name: &str, node_type: &str, extra: &[&str]) -> String {
    let mut args = vec!["template", "new", name, "--type", node_type, "-f", "id"];
    args.extend_from_slice(extra);
    let id = stdout_of(tmp, &args);
    assert!(id.starts_with("TPL-"), "unexpected id output: {}", id);
    id
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    ntk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("template"))
        .stdout(predicate::str::contains("props"));
}

#[test]
fn test_version_displays() {
    ntk()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ntk"));
}

#[test]
fn test_completions_bash() {
    ntk()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ntk"));
}

#[test]
fn test_command_outside_workspace_fails() {
    let tmp = TempDir::new().unwrap();
    ntk()
        .current_dir(tmp.path())
        .args(["template", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an ntk workspace"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_workspace_and_seeds_catalog() {
    let tmp = TempDir::new().unwrap();
    ntk()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized ntk workspace"))
        .stdout(predicate::str::contains("in 4 categories"));

    assert!(tmp.path().join(".ntk/config.yaml").exists());
    assert!(tmp.path().join(".ntk/templates").is_dir());
    assert!(tmp.path().join(".ntk/store.db").exists());
}

#[test]
fn test_init_twice_warns() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[test]
fn test_catalog_status_is_clean_after_init() {
    let tmp = setup_workspace();
    let csv = stdout_of(&tmp, &["catalog", "status", "-f", "csv"]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "category,installed,expected,status");
    assert_eq!(lines.len(), 5);
    assert!(lines[1..].iter().all(|l| l.ends_with(",ok")));
}

#[test]
fn test_catalog_seed_force_reinstalls() {
    let tmp = setup_workspace();
    let before = stdout_of(&tmp, &["template", "list", "-f", "id"]).lines().count();

    ntk()
        .current_dir(tmp.path())
        .args(["catalog", "seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    ntk()
        .current_dir(tmp.path())
        .args(["catalog", "seed", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reinstalled"));

    let after = stdout_of(&tmp, &["template", "list", "-f", "id"]).lines().count();
    assert_eq!(before, after);
}

// ============================================================================
// Template Tests
// ============================================================================

#[test]
fn test_template_list_includes_catalog() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User Task"))
        .stdout(predicate::str::contains("template(s) found"));

    let csv = stdout_of(&tmp, &["template", "list", "--type", "bpmn:ServiceTask", "-f", "csv"]);
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("id,name,type,category,version,uses"));
    assert!(lines.all(|l| l.contains("bpmn:ServiceTask")));
}

#[test]
fn test_template_new_show_and_resolve_by_name() {
    let tmp = setup_workspace();
    let id = create_template(
        &tmp,
        "Invoice Review",
        "bpmn:UserTask",
        &["-d", "Check invoices", "-t", "finance,review", "-s", "assignee=bob"],
    );

    ntk()
        .current_dir(tmp.path())
        .args(["template", "show", "invoice review"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("finance, review"))
        .stdout(predicate::str::contains("assignee = bob"));

    let json = stdout_of(&tmp, &["template", "show", &id, "-f", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "Invoice Review");
    assert_eq!(value["metadata"]["version"], "1.0.0");
    assert_eq!(value["metadata"]["author"], "tester");
}

#[test]
fn test_template_new_requires_name() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .args(["template", "new", "--type", "bpmn:Task"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name is required"));
}

#[test]
fn test_template_search_ranks_name_matches_first() {
    let tmp = setup_workspace();
    create_template(&tmp, "Zeta Approval", "bpmn:UserTask", &[]);
    create_template(&tmp, "Alpha", "bpmn:UserTask", &["-d", "needs approval"]);

    let names: Vec<String> = stdout_of(&tmp, &["template", "search", "approval", "-f", "csv"])
        .lines()
        .skip(1)
        .map(|l| l.split(',').nth(1).unwrap_or_default().to_string())
        .collect();
    let zeta = names.iter().position(|n| n == "Zeta Approval").unwrap();
    let alpha = names.iter().position(|n| n == "Alpha").unwrap();
    assert!(zeta < alpha, "name hit should outrank description hit: {:?}", names);
}

#[test]
fn test_template_edit_and_delete() {
    let tmp = setup_workspace();
    let id = create_template(&tmp, "Notify", "bpmn:SendTask", &["-s", "channel=email"]);

    ntk()
        .current_dir(tmp.path())
        .args(["template", "edit", &id, "--name", "Notify Customer", "--set", "channel=sms", "--unset", "missing"])
        .assert()
        .success();
    let json = stdout_of(&tmp, &["template", "show", &id, "-f", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "Notify Customer");
    assert_eq!(value["properties"]["channel"], "sms");

    ntk()
        .current_dir(tmp.path())
        .args(["template", "delete", &id, "-y"])
        .assert()
        .success();
    ntk()
        .current_dir(tmp.path())
        .args(["template", "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_template_edit_without_changes_fails() {
    let tmp = setup_workspace();
    let id = create_template(&tmp, "Idle", "bpmn:Task", &[]);
    ntk()
        .current_dir(tmp.path())
        .args(["template", "edit", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to change"));
}

#[test]
fn test_template_instantiate_counts_usage() {
    let tmp = setup_workspace();
    let id = create_template(&tmp, "Desk Check", "bpmn:ManualTask", &["-s", "station=A"]);
    let out = tmp.path().join("element.json");

    ntk()
        .current_dir(tmp.path())
        .args(["template", "instantiate", &id, "--x", "120", "--y", "40", "-s", "station=B"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created element EL-"));

    let element: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(element["type"], "bpmn:ManualTask");
    assert_eq!(element["business_object"]["properties"]["name"], "Desk Check");
    assert_eq!(element["business_object"]["properties"]["station"], "B");
    assert_eq!(element["business_object"]["template"]["id"], id.as_str());

    let popular = stdout_of(&tmp, &["template", "popular", "1", "-f", "id"]);
    assert_eq!(popular, id);
}

#[test]
fn test_template_scaffold_then_import() {
    let tmp = setup_workspace();
    let file = tmp.path().join(".ntk/templates/review.yaml");

    ntk()
        .current_dir(tmp.path())
        .args(["template", "scaffold", "Peer Review", "--type", "bpmn:UserTask", "-t", "qa"])
        .arg("-o")
        .arg(&file)
        .assert()
        .success();
    let yaml = fs::read_to_string(&file).unwrap();
    assert!(yaml.contains("nodeType: \"bpmn:UserTask\"") || yaml.contains("nodeType: bpmn:UserTask"));
    assert!(yaml.contains("assignee:"));

    ntk()
        .current_dir(tmp.path())
        .args(["template", "import", "--category", "Tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 template(s)"));

    let json = stdout_of(&tmp, &["template", "show", "Peer Review", "-f", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["nodeType"], "bpmn:UserTask");
    assert_eq!(value["metadata"]["tags"][0], "qa");
}

#[test]
fn test_template_import_reports_bad_files() {
    let tmp = setup_workspace();
    let dir = tmp.path().join("incoming");
    fs::create_dir(&dir).unwrap();
    write_file(&dir.join("good.yaml"), "name: Good\nnodeType: bpmn:Task\n");
    write_file(&dir.join("bad.yaml"), "description: [unterminated\n");

    ntk()
        .current_dir(tmp.path())
        .args(["template", "import", "incoming"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 template(s)"))
        .stderr(predicate::str::contains("bad.yaml"));
}

// ============================================================================
// Version Tests
// ============================================================================

#[test]
fn test_version_create_list_restore() {
    let tmp = setup_workspace();
    let id = create_template(&tmp, "Payment", "bpmn:ServiceTask", &["-s", "endpoint=/v1/pay"]);

    let vid = stdout_of(&tmp, &["version", "create", &id, "-m", "first cut", "-f", "id"]);
    assert!(vid.starts_with("VER-"));

    ntk()
        .current_dir(tmp.path())
        .args(["template", "edit", &id, "--set", "endpoint=/v2/pay"])
        .assert()
        .success();

    let listing = stdout_of(&tmp, &["version", "list", &id, "-f", "csv"]);
    assert!(listing.contains("1.0.1"));
    assert!(listing.contains("first cut"));

    ntk()
        .current_dir(tmp.path())
        .args(["version", "restore", &id, "1.0.1", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));

    let json = stdout_of(&tmp, &["template", "show", &id, "-f", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["properties"]["endpoint"], "/v1/pay");
    assert_eq!(value["metadata"]["version"], "1.0.1");

    // restoring does not record a version
    let listing = stdout_of(&tmp, &["version", "list", &id, "-f", "id"]);
    assert_eq!(listing.lines().count(), 1);
}

#[test]
fn test_version_restore_unknown_fails() {
    let tmp = setup_workspace();
    let id = create_template(&tmp, "Lonely", "bpmn:Task", &[]);
    ntk()
        .current_dir(tmp.path())
        .args(["version", "restore", &id, "9.9.9", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Version not found"));
}

// ============================================================================
// Category Tests
// ============================================================================

#[test]
fn test_category_lifecycle_keeps_templates() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .args(["category", "new", "Finance", "--order", "10", "--sort", "usage"])
        .assert()
        .success();
    let id = create_template(&tmp, "Ledger Post", "bpmn:ServiceTask", &["-c", "Finance"]);

    let listing = stdout_of(&tmp, &["category", "list", "-f", "csv"]);
    let finance = listing.lines().find(|l| l.contains(",Finance,")).unwrap();
    assert!(finance.contains(",10,usage,1,"));

    ntk()
        .current_dir(tmp.path())
        .args(["category", "show", "finance", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    ntk()
        .current_dir(tmp.path())
        .args(["category", "delete", "Finance", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("still reference it"));

    // the template survives with a dangling category reference
    ntk()
        .current_dir(tmp.path())
        .args(["template", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("(missing)"));
}

#[test]
fn test_category_duplicate_name_fails() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .args(["category", "new", "tasks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_schema_show_includes_template_forms() {
    let tmp = setup_workspace();
    let keys = stdout_of(&tmp, &["schema", "show", "bpmn:ServiceTask", "-f", "id"]);
    let keys: Vec<&str> = keys.lines().collect();
    assert!(keys.contains(&"id"));
    assert!(keys.contains(&"method"));
    assert_eq!(keys.iter().filter(|k| **k == "name").count(), 1);
}

#[test]
fn test_schema_show_unknown_type_fails() {
    let tmp = setup_workspace();
    ntk()
        .current_dir(tmp.path())
        .args(["schema", "show", "bpmn:Nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No schema"));
}

#[test]
fn test_schema_list_without_workspace() {
    let tmp = TempDir::new().unwrap();
    ntk()
        .current_dir(tmp.path())
        .args(["schema", "list", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bpmn:UserTask"));
}

// ============================================================================
// Property Tests
// ============================================================================

const USER_TASK: &str = r#"{
  "id": "Task_1",
  "type": "bpmn:UserTask",
  "business_object": { "properties": { "assignee": "alice", "name": "Review" } }
}"#;

const MANUAL_TASK: &str = r#"{
  "id": "Manual_1",
  "type": "bpmn:ManualTask",
  "business_object": { "properties": { "name": "Sign" } }
}"#;

#[test]
fn test_props_validate_valid_element() {
    let tmp = setup_workspace();
    let file = tmp.path().join("manual.json");
    write_file(&file, MANUAL_TASK);

    ntk()
        .current_dir(tmp.path())
        .args(["props", "validate", "manual.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_props_validate_reports_published_required_fields() {
    let tmp = setup_workspace();
    let file = tmp.path().join("task.json");
    write_file(&file, USER_TASK);

    // the catalog's Approval Task publishes a required approvalLevel field
    ntk()
        .current_dir(tmp.path())
        .args(["props", "validate", "task.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("approvalLevel"))
        .stderr(predicate::str::contains("validation error(s)"));
}

#[test]
fn test_props_set_updates_fragment() {
    let tmp = setup_workspace();
    let file = tmp.path().join("task.json");
    write_file(&file, USER_TASK);

    ntk()
        .current_dir(tmp.path())
        .args(["props", "set", "task.json", "assignee=carol", "candidateUsers=a, b"])
        .assert()
        .success();

    let element: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    let properties = &element["business_object"]["properties"];
    assert_eq!(properties["assignee"], "carol");
    assert_eq!(properties["candidateUsers"], serde_json::json!(["a", "b"]));

    ntk()
        .current_dir(tmp.path())
        .args(["props", "fragment", "task.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("carol"));
}

#[test]
fn test_props_set_unknown_key_fails() {
    let tmp = setup_workspace();
    write_file(&tmp.path().join("task.json"), USER_TASK);
    ntk()
        .current_dir(tmp.path())
        .args(["props", "set", "task.json", "nonsense=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no editable property"));
}

#[test]
fn test_props_set_read_only_fails() {
    let tmp = setup_workspace();
    write_file(&tmp.path().join("task.json"), USER_TASK);
    ntk()
        .current_dir(tmp.path())
        .args(["props", "set", "task.json", "id=Other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read-only"));
}

#[test]
fn test_props_fragment_missing() {
    let tmp = setup_workspace();
    write_file(&tmp.path().join("task.json"), USER_TASK);
    ntk()
        .current_dir(tmp.path())
        .args(["props", "fragment", "task.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no extension fragment"));
}

#[test]
fn test_props_export_csv() {
    let tmp = setup_workspace();
    write_file(&tmp.path().join("task.json"), USER_TASK);
    let csv = stdout_of(&tmp, &["props", "export", "task.json", "--as", "csv"]);
    insta::assert_snapshot!(csv, @r###"
    key,value,type,label
    "assignee","alice","text","Assignee"
    "name","Review","text","Name"
    "###);
}

#[test]
fn test_props_export_then_import() {
    let tmp = setup_workspace();
    write_file(&tmp.path().join("task.json"), USER_TASK);
    write_file(
        &tmp.path().join("other.yaml"),
        "id: Task_2\ntype: bpmn:UserTask\nbusiness_object:\n  properties:\n    name: Copy\n",
    );

    ntk()
        .current_dir(tmp.path())
        .args(["props", "export", "task.json", "-o", "props.json", "-m"])
        .assert()
        .success();
    let exported = fs::read_to_string(tmp.path().join("props.json")).unwrap();
    assert!(exported.contains("exportTime"));

    ntk()
        .current_dir(tmp.path())
        .args(["props", "import", "other.yaml", "props.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 properties"));

    let yaml = fs::read_to_string(tmp.path().join("other.yaml")).unwrap();
    assert!(yaml.contains("alice"));
    assert!(yaml.contains("extension"));
}

#[test]
fn test_props_apply_template_fills_missing_only() {
    let tmp = setup_workspace();
    let id = create_template(
        &tmp,
        "Clerk",
        "bpmn:UserTask",
        &["-s", "assignee=clerk", "-s", "formKey=clerk-form"],
    );
    write_file(&tmp.path().join("task.json"), USER_TASK);

    ntk()
        .current_dir(tmp.path())
        .args(["props", "apply", "task.json", "Clerk"])
        .assert()
        .success();

    let element: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("task.json")).unwrap()).unwrap();
    let bo = &element["business_object"];
    assert_eq!(bo["properties"]["assignee"], "alice");
    assert_eq!(bo["properties"]["formKey"], "clerk-form");
    assert_eq!(bo["template"]["id"], id.as_str());
    assert_eq!(bo["template"]["inherited"], true);
}
