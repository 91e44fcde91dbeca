use dir2db::store::{LmdbStore, StoreOptions};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "dir2db_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::canonicalize(dir).unwrap()
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Runs the binary with an isolated config location.
fn run(base: &Path, args: &[&str], envs: &[(&str, &str)]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_dir2db");
    let mut cmd = Command::new(bin);
    cmd.args(args)
        .env("DIR2DB_CONFIG", base.join("absent.toml"))
        .env_remove("DIR2DB_DB")
        .env_remove("DIR2DB_LOG");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    Ok(cmd.output()?)
}

fn run_json(base: &Path, args: &[&str], envs: &[(&str, &str)]) -> anyhow::Result<Value> {
    let out = run(base, args, envs)?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

#[test]
fn ingests_matching_files_and_records_class_names() -> anyhow::Result<()> {
    let base = temp_dir("e2e");
    let root = base.join("site");
    let db = base.join("store").join("dir2db.lmdb");
    write_file(&root.join("a.php"), "<?php class A {}")?;
    write_file(&root.join("b.txt"), "not php")?;
    write_file(&root.join("excluded/c.php"), "<?php class C {}")?;

    let db_str = db.to_string_lossy().to_string();
    let root_str = root.to_string_lossy().to_string();
    let summary = run_json(
        &base,
        &["-p", &root_str, "-e", "excluded", "--format", "json"],
        &[("DIR2DB_DB", &db_str)],
    )?;

    assert_eq!(summary["total_files"], 1);
    assert_eq!(summary["rows_inserted"], 1);
    assert_eq!(summary["error_count"], 0);
    assert_eq!(summary["class_names"], 1);

    let stats = run_json(&base, &["--stats", "--db", &db_str], &[])?;
    assert_eq!(stats["rows"], 1);
    assert_eq!(stats["named_rows"], 1);

    let store = LmdbStore::open(&db, &StoreOptions::default())?;
    let key = root.join("a.php").to_string_lossy().to_string();
    assert_eq!(store.class_name(&key)?.as_deref(), Some("A"));
    assert_eq!(
        store.source(&key)?.as_deref(),
        Some(&b"<?php class A {}"[..])
    );
    let excluded = root.join("excluded/c.php").to_string_lossy().to_string();
    assert_eq!(store.source(&excluded)?, None);
    drop(store);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn rerun_replaces_rows_by_default() -> anyhow::Result<()> {
    let base = temp_dir("rerun");
    let root = base.join("site");
    let db = base.join("dir2db.lmdb");
    write_file(&root.join("src/Kernel.php"), "<?php\nnamespace App;\nclass Kernel {}\n")?;

    let db_str = db.to_string_lossy().to_string();
    let root_str = root.to_string_lossy().to_string();
    let args = ["-p", root_str.as_str(), "--db", db_str.as_str(), "-f", "json"];

    let first = run_json(&base, &args, &[])?;
    let second = run_json(&base, &args, &[])?;
    assert_eq!(first["rows_inserted"], 1);
    assert_eq!(second["rows_inserted"], 1);
    assert_eq!(second["error_count"], 0);

    let stats = run_json(&base, &["--stats", "--db", &db_str], &[])?;
    assert_eq!(stats["rows"], 1);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn skip_policy_counts_existing_rows_as_errors() -> anyhow::Result<()> {
    let base = temp_dir("skip");
    let root = base.join("site");
    let db = base.join("dir2db.lmdb");
    let config = base.join("local.toml");
    write_file(&root.join("a.php"), "<?php class A {}")?;
    write_file(
        &config,
        &format!(
            "[store]\npath = '{}'\non_conflict = \"skip\"\n",
            db.to_string_lossy()
        ),
    )?;

    let root_str = root.to_string_lossy().to_string();
    let config_str = config.to_string_lossy().to_string();
    let args = ["-p", root_str.as_str(), "--config", config_str.as_str(), "-f", "json"];

    let first = run_json(&base, &args, &[])?;
    assert_eq!(first["rows_inserted"], 1);
    let second = run_json(&base, &args, &[])?;
    assert_eq!(second["rows_inserted"], 0);
    assert_eq!(second["error_count"], 1);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn missing_path_prints_help_and_does_nothing() -> anyhow::Result<()> {
    let base = temp_dir("help");
    let out = run(&base, &[], &[])?;
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--path"));
    assert!(stdout.contains("--exclusions"));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn version_flag_prints_version() -> anyhow::Result<()> {
    let base = temp_dir("version");
    let out = run(&base, &["-v"], &[])?;
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn missing_store_config_fails_before_scanning() -> anyhow::Result<()> {
    let base = temp_dir("noconfig");
    let root_str = base.join("does-not-exist").to_string_lossy().to_string();
    let out = run(&base, &["-p", &root_str], &[])?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no store path configured"), "{stderr}");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn bad_root_and_empty_tree_are_fatal() -> anyhow::Result<()> {
    let base = temp_dir("fatal");
    let db_str = base.join("dir2db.lmdb").to_string_lossy().to_string();

    let missing = base.join("missing").to_string_lossy().to_string();
    let out = run(&base, &["-p", &missing, "--db", &db_str], &[])?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));

    let empty = base.join("empty");
    write_file(&empty.join("readme.md"), "# nothing")?;
    let empty_str = empty.to_string_lossy().to_string();
    let out = run(&base, &["-p", &empty_str, "--db", &db_str], &[])?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("no files found"));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn init_config_writes_template_once() -> anyhow::Result<()> {
    let base = temp_dir("init");
    let config = base.join("conf").join("local.toml");
    let config_str = config.to_string_lossy().to_string();

    let out = run(&base, &["--init-config", "--config", &config_str], &[])?;
    assert!(out.status.success());
    assert!(std::fs::read_to_string(&config)?.contains("[store]"));

    let out = run(&base, &["--init-config", "--config", &config_str], &[])?;
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("already present"));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}
