use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_gallery-query")
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).expect("failed to write test file");
}

fn run(args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env_remove("GALLERY_QUERY_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("command should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const POSTS: &str = r#"[
  {"id": 1, "tags": ["cat", "girl"], "score": 150, "owner": "artist_42", "status": "pending"},
  {"id": 2, "tags": ["dog"], "score": 50, "owner": "artist_7", "status": "saved"},
  {"id": 3, "tags": ["mouse"], "score": 200, "owner": "someone", "status": "saved"}
]"#;

#[test]
fn test_search_json_output() {
    let dir = tempdir().expect("temp dir");
    let posts = dir.path().join("posts.json");
    write_file(&posts, POSTS);

    let output = run(&[
        "-F",
        "json",
        "search",
        posts.to_str().expect("utf8 path"),
        "(cat|dog) owner:artist*",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["search"]["matches"], 2);
    assert_eq!(value["search"]["posts"][0]["post"]["id"], 1);
    assert_eq!(value["search"]["posts"][1]["post"]["id"], 2);
}

#[test]
fn test_search_status_flag_and_directive() {
    let dir = tempdir().expect("temp dir");
    let posts = dir.path().join("posts.json");
    write_file(&posts, POSTS);
    let path = posts.to_str().expect("utf8 path");

    let output = run(&["-F", "json", "search", path, "", "--status", "saved"]);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["search"]["matches"], 2);

    let output = run(&["-F", "json", "search", path, "status:pending", "--status", "saved"]);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["search"]["status"], "pending");
    assert_eq!(value["search"]["matches"], 1);
}

#[test]
fn test_search_text_reports_query_warnings() {
    let dir = tempdir().expect("temp dir");
    let posts = dir.path().join("posts.json");
    write_file(&posts, POSTS);

    let output = run(&[
        "--color",
        "never",
        "search",
        posts.to_str().expect("utf8 path"),
        "cat score:>many",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("SEARCH matched 1 of 3 posts"), "got:\n{text}");
    assert!(text.contains("warning: Invalid number for 'score': 'many'"), "got:\n{text}");
}

#[test]
fn test_output_file_matches_stdout() {
    let dir = tempdir().expect("temp dir");
    let out = dir.path().join("out.json");

    let output = run(&[
        "-F",
        "json",
        "-o",
        out.to_str().expect("utf8 path"),
        "parse",
        "girl -blonde",
    ]);
    assert!(output.status.success());

    let file_content = fs::read_to_string(&out).expect("output file should exist");
    assert_eq!(file_content.trim(), stdout(&output).trim());
    let value: serde_json::Value = serde_json::from_str(&file_content).expect("json file");
    assert_eq!(value["parse"]["canonical"], "girl -blonde");
}

#[test]
fn test_output_file_has_no_color_codes() {
    let dir = tempdir().expect("temp dir");
    let posts = dir.path().join("posts.json");
    let out = dir.path().join("report.txt");
    write_file(&posts, POSTS);

    let output = run(&[
        "--color",
        "always",
        "-o",
        out.to_str().expect("utf8 path"),
        "search",
        posts.to_str().expect("utf8 path"),
        "cat score:>many",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains('\x1b'), "stdout should be colored");

    let file_content = fs::read_to_string(&out).expect("output file should exist");
    assert!(!file_content.contains('\x1b'), "got:\n{file_content}");
    assert!(file_content.contains("warning: Invalid number for 'score': 'many'"));
}

#[test]
fn test_size_and_ratio_filters() {
    let dir = tempdir().expect("temp dir");
    let posts = dir.path().join("posts.json");
    write_file(
        &posts,
        r#"[
  {"id": 1, "file_size": 6291456, "width": 1920, "height": 1080},
  {"id": 2, "file_size": 1048576, "width": 1920, "height": 1080},
  {"id": 3, "file_size": 8388608, "width": 1080, "height": 1920}
]"#,
    );

    let output = run(&[
        "-F",
        "json",
        "search",
        posts.to_str().expect("utf8 path"),
        "size:>5mb ratio:>1.5",
    ]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["search"]["matches"], 1);
    assert_eq!(value["search"]["posts"][0]["post"]["id"], 1);
}

#[test]
fn test_parse_text_shows_tree() {
    let output = run(&["--color", "never", "parse", "(a|b) c"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Canonical: (a|b) c"), "got:\n{text}");
    assert!(text.contains("AND"));
    assert!(text.contains("  OR"));
}

#[test]
fn test_preprocess_command() {
    let output = run(&["-F", "json", "preprocess", "status:saved girl sort:score"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["preprocess"]["status"], "saved");
    assert_eq!(value["preprocess"]["cleaned_query"], "girl");
    assert_eq!(value["preprocess"]["metadata"]["sort"]["fields"][0], "score");
}

#[test]
fn test_config_from_env_and_flag() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("engine.toml");
    write_file(&config, "[query]\ngroup_whitespace = \"legacy\"\n");

    let output = Command::new(bin())
        .args(["-F", "json", "parse", "(title:two words|cat)"])
        .env("GALLERY_QUERY_CONFIG", &config)
        .output()
        .expect("command should run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json stdout");
    assert_eq!(value["parse"]["root"]["children"][0]["value"], "two words");
}

#[test]
fn test_missing_posts_file_fails() {
    let dir = tempdir().expect("temp dir");
    let output = run(&[
        "search",
        dir.path().join("missing.json").to_str().expect("utf8 path"),
        "girl",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.json"));
}

#[test]
fn test_bad_config_fails() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("bad.toml");
    write_file(&config, "profile_name = [");

    let output = run(&["--config", config.to_str().expect("utf8 path"), "parse", "girl"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}
