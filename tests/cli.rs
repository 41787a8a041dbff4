use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn poemdb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("poemdb");
    path
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let poems = root.join("poems");
    write(
        &poems.join("全唐诗/poet.tang.0.json"),
        r#"[{"author": "李白", "title": "静夜思", "paragraphs": ["床前明月光，疑是地上霜。", "举头望明月，低头思故乡。"]},
            {"author": "杜甫", "title": "春望", "paragraphs": ["国破山河在，城春草木深。"]}]"#,
    );
    write(
        &poems.join("楚辞/chuci.json"),
        r#"[{"title": "离骚", "section": "离骚", "author": "屈原", "content": ["帝高阳之苗裔兮，朕皇考曰伯庸。"]}]"#,
    );
    write(
        &poems.join("rank/poet/poet.tang.rank.0.json"),
        r#"[{"author": "李白", "title": "静夜思", "baidu": 100}]"#,
    );

    let config_content = format!(
        r#"[db]
path = "{root}/data/pocket_poem.db"

[corpus]
root = "{root}/poems"

[ranking]
dir = "{root}/poems/rank"
output = "{root}/data/popular-poems.json"
"#,
        root = root.display()
    );

    let config_path = root.join("config/poemdb.toml");
    write(&config_path, &config_content);

    (tmp, config_path)
}

fn run_poemdb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = poemdb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run poemdb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_poemdb(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_poemdb(&config_path, &["init"]);
    assert!(success, "second init failed (not idempotent)");
}

#[test]
fn test_sources_lists_families() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_poemdb(&config_path, &["sources"]);
    assert!(success, "sources failed: {}", stderr);
    assert!(stdout.contains("tangshi"));
    assert!(stdout.contains("MISSING"));
    assert!(stdout.contains("2 file(s) in catalog"));
}

#[test]
fn test_build_reports_totals() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_poemdb(&config_path, &["build"]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("total poems: 3"));
    assert!(stdout.contains("ok"));
    assert!(tmp.path().join("data/pocket_poem.db").exists());
}

#[test]
fn test_build_dry_run_creates_no_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_poemdb(&config_path, &["build", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("build (dry-run)"));
    assert!(stdout.contains("total poems: 3"));
    assert!(!tmp.path().join("data/pocket_poem.db").exists());
}

#[test]
fn test_pipeline_then_stats() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_poemdb(&config_path, &["pipeline", "--skip-convert"]);
    assert!(success, "pipeline failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("marked: 1"));

    let (stdout, stderr, success) = run_poemdb(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Integrity:   ok"));
    assert!(stdout.contains("idx_author"));
}

#[test]
fn test_stats_without_database_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_poemdb(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("poemdb build"));
}

#[test]
fn test_collection_commands() {
    let (_tmp, config_path) = setup_test_env();
    run_poemdb(&config_path, &["build"]);

    let (stdout, _, success) = run_poemdb(&config_path, &["collection", "create", "月"]);
    assert!(success);
    assert!(stdout.contains("created collection 2"));

    let (_, stderr, success) = run_poemdb(&config_path, &["collection", "create", "月"]);
    assert!(!success, "duplicate collection name was accepted");
    assert!(stderr.contains("already exists"));

    let (_, _, success) = run_poemdb(&config_path, &["collection", "add", "2", "1"]);
    assert!(success);
    let (stdout, _, _) = run_poemdb(&config_path, &["collection", "add", "2", "1"]);
    assert!(stdout.contains("already in collection"));

    let (stdout, _, success) = run_poemdb(&config_path, &["collection", "show", "2"]);
    assert!(success);
    assert!(stdout.contains("静夜思"));

    let (_, stderr, success) = run_poemdb(&config_path, &["collection", "delete", "1"]);
    assert!(!success, "default collection was deleted");
    assert!(stderr.contains("default collection"));
}

#[test]
fn test_convert_without_stages_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_poemdb(&config_path, &["convert"]);
    assert!(!success);
    assert!(stderr.contains("conversion stages"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_poemdb(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
