#![allow(missing_docs, clippy::unwrap_used)]

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn scrapemock_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scrapemock"));
    cmd.env_remove("SCRAPEMOCK_CONFIG")
        .env_remove("SCRAPEMOCK_JOB_ID")
        .env_remove("SCRAPEMOCK_SCRAPER_NAME")
        .env_remove("SCRAPEMOCK_ALLOW_PAGE_GID_OVERRIDE")
        .env_remove("SCRAPEMOCK_ALLOW_JOB_ID_OVERRIDE")
        .env_remove("SCRAPEMOCK_MAX_PER_PAGE");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    fs::write(&path, content)?;
    Ok(path)
}

fn stdout_json(cmd: &mut Command) -> Result<Value> {
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

const PARSER_REFERENCE: &str = "content\nfailed_content\noutputs\npages\npage\nsave_pages\n\
                                save_outputs\nfind_output\nfind_outputs\nrefetch\nreparse\n";

#[test]
fn gid_is_stable_across_query_order() -> Result<()> {
    let dir = TempDir::new()?;
    let a = write(&dir, "a.json", r#"{"url": "https://shop.com/list?b=2&a=1"}"#)?;
    let b = write(&dir, "b.json", r#"{"url": "https://shop.com/list?a=1&b=2#top"}"#)?;

    let gid_a = scrapemock_cmd().arg("gid").arg(&a).assert().success().get_output().stdout.clone();
    let gid_b = scrapemock_cmd().arg("gid").arg(&b).assert().success().get_output().stdout.clone();

    assert_eq!(gid_a, gid_b);
    assert!(String::from_utf8(gid_a)?.starts_with("shop.com-"));
    Ok(())
}

#[test]
fn gid_reads_stdin() {
    scrapemock_cmd()
        .args(["gid", "-"])
        .write_stdin(r#"{"url": "https://shop.com/item/1", "method": "POST"}"#)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("shop.com-"));
}

#[test]
fn gid_rejects_non_object() -> Result<()> {
    let dir = TempDir::new()?;
    let page = write(&dir, "page.json", "[1, 2]")?;
    scrapemock_cmd()
        .arg("gid")
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Page must be a JSON object"));
    Ok(())
}

#[test]
fn compat_passes_and_warns_on_new_operations() -> Result<()> {
    let dir = TempDir::new()?;
    let reference = write(&dir, "parser.txt", &format!("{PARSER_REFERENCE}save_jobs\n"))?;

    let assert = scrapemock_cmd()
        .args(["compat", "--role", "parser", "--reference"])
        .arg(&reference)
        .assert()
        .success()
        .stderr(predicate::str::contains("save_jobs"));

    let report: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(report["is_compatible"], json!(true));
    assert_eq!(report["missing"], json!([]));
    assert_eq!(report["new"], json!(["save_jobs"]));
    Ok(())
}

#[test]
fn compat_fails_when_reference_lacks_operations() {
    scrapemock_cmd()
        .args(["compat", "--role", "finisher", "--reference", "-"])
        .write_stdin("outputs\nsave_outputs\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"is_compatible\": false"))
        .stderr(predicate::str::contains(
            "Incompatible interface, missing operations: find_output, find_outputs",
        ));
}

#[test]
fn compat_quiet_hides_warnings() -> Result<()> {
    let dir = TempDir::new()?;
    let reference = write(&dir, "parser.txt", &format!("{PARSER_REFERENCE}save_jobs\n"))?;
    scrapemock_cmd()
        .args(["--quiet", "compat", "--role", "parser", "--reference"])
        .arg(&reference)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
    Ok(())
}

#[test]
fn query_saves_fixture_drafts() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write(
        &dir,
        "fixture.json",
        &json!({
            "job_id": 3,
            "scraper_name": "shop",
            "pages": [{"url": "https://shop.com/item/1"}],
            "outputs": [
                {"_collection": "products", "name": "Widget"},
                {"_collection": "products", "name": "Gadget"},
                {"_collection": "reviews", "stars": 5},
            ],
        })
        .to_string(),
    )?;

    let products = stdout_json(
        scrapemock_cmd()
            .arg("query")
            .arg(&fixture)
            .args(["--filter", r#"{"_collection": "products"}"#, "--limit", "1", "--offset", "1"]),
    )?;
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], json!("Gadget"));
    assert_eq!(products[0]["_job_id"], json!(3));

    let pages = stdout_json(
        scrapemock_cmd()
            .arg("query")
            .arg(&fixture)
            .args(["--collection", "pages"]),
    )?;
    assert_eq!(pages[0]["status"], json!("to_fetch"));
    assert_eq!(pages[0]["job_id"], json!(3));

    let jobs = stdout_json(
        scrapemock_cmd()
            .arg("query")
            .arg(&fixture)
            .args(["--collection", "jobs"]),
    )?;
    assert_eq!(jobs[0]["scraper_name"], json!("shop"));
    Ok(())
}

#[test]
fn query_rejects_unknown_collection() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write(&dir, "fixture.json", "{}")?;
    scrapemock_cmd()
        .arg("query")
        .arg(&fixture)
        .args(["--collection", "sessions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown collection sessions."));
    Ok(())
}

#[test]
fn query_uses_config_file_and_env() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write(
        &dir,
        "scrapemock.toml",
        "[store]\njob_id = 40\nscraper_name = \"from-config\"\n",
    )?;
    let fixture = write(&dir, "fixture.json", "{}")?;

    let jobs = stdout_json(
        scrapemock_cmd()
            .arg("--config")
            .arg(&config)
            .arg("query")
            .arg(&fixture)
            .args(["--collection", "jobs"]),
    )?;
    assert_eq!(jobs, json!([{
        "job_id": 40,
        "scraper_name": "from-config",
        "status": "active",
        "created_at": jobs[0]["created_at"].clone(),
    }]));

    let jobs = stdout_json(
        scrapemock_cmd()
            .env("SCRAPEMOCK_JOB_ID", "41")
            .arg("--config")
            .arg(&config)
            .arg("query")
            .arg(&fixture)
            .args(["--collection", "jobs"]),
    )?;
    assert_eq!(jobs[0]["job_id"], json!(41));
    Ok(())
}

#[test]
fn invalid_env_override_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write(&dir, "fixture.json", "{}")?;
    scrapemock_cmd()
        .env("SCRAPEMOCK_MAX_PER_PAGE", "lots")
        .arg("query")
        .arg(&fixture)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid environment override"));
    Ok(())
}
