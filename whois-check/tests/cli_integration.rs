// whois-check/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use tempfile::{NamedTempFile, TempDir};

/// Fake WHOIS server on 127.0.0.1: names starting with "taken" are
/// registered, everything else is available. Returns the port.
fn spawn_fake_whois() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake server");
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut query = String::new();
            if BufReader::new(&stream).read_line(&mut query).is_err() {
                continue;
            }

            let domain = query.trim().to_uppercase();
            let reply = if domain.starts_with("TAKEN") {
                format!(
                    "Domain Name: {}\r\n\
                     Registry Expiry Date: 2031-02-03T00:00:00Z\r\n\
                     Registrar: Fake Registrar LLC\r\n",
                    domain
                )
            } else {
                format!("No match for \"{}\".\r\n", domain)
            };
            let _ = stream.write_all(reply.as_bytes());
        }
    });

    port
}

/// A command isolated from the user's config files and WC_* variables.
fn whois_check(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("whois-check").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("RUST_LOG");
    for var in [
        "WC_CONCURRENCY",
        "WC_TIMEOUT",
        "WC_REFERRAL_TIMEOUT",
        "WC_MAX_REFERRAL_HOPS",
        "WC_DEADLINE",
        "WC_BROKER",
        "WC_PROBE",
        "WC_JSON",
        "WC_CSV",
        "WC_FILE",
        "WC_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn server_arg(port: u16) -> String {
    format!("test=127.0.0.1:{}", port)
}

/// Helper to create a test domains file
fn create_test_domains_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    fs::write(file.path(), content).expect("Failed to write to temp file");
    file
}

#[test]
fn test_help_lists_flags() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--keep-order"))
        .stdout(predicate::str::contains("--deadline"))
        .stdout(predicate::str::contains("--probe"));
}

#[test]
fn test_conflicting_output_formats_error() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .args(["example.com", "--json", "--csv"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot specify multiple output formats"));
}

#[test]
fn test_invalid_server_override_error() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .args(["example.com", "--server", "nonsense"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SUFFIX=HOST[:PORT]"));
}

#[test]
fn test_no_input_is_an_error() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_missing_file_error() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .args(["--file", "does-not-exist.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_invalid_domain_is_reported_not_fatal() {
    let home = TempDir::new().unwrap();
    whois_check(&home)
        .args(["not a domain", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"unknown\""))
        .stdout(predicate::str::contains("\"error_kind\": \"validation\""));
}

#[test]
fn test_json_output_in_input_order() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    let assert = whois_check(&home)
        .args(["taken.test", "free.test", "--json", "--server", &server_arg(port)])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["domain"], "taken.test");
    assert_eq!(results[0]["status"], "registered");
    assert_eq!(results[0]["expiration_date"], "2031-02-03");
    assert_eq!(results[0]["registrar"], "Fake Registrar LLC");
    assert_eq!(results[1]["domain"], "free.test");
    assert_eq!(results[1]["status"], "available");
}

#[test]
fn test_csv_output() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    whois_check(&home)
        .args(["free.test", "taken.test", "--csv", "-s", &server_arg(port)])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "domain,status,expiration_date,registrar,error\n",
        ))
        .stdout(predicate::str::contains("free.test,available,,,\n"))
        .stdout(predicate::str::contains(
            "taken.test,registered,2031-02-03,Fake Registrar LLC,\n",
        ));
}

#[test]
fn test_table_output_and_summary() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    whois_check(&home)
        .args(["taken.test", "free.test", "--server", &server_arg(port)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registrar"))
        .stdout(predicate::str::contains("AVAILABLE"))
        .stdout(predicate::str::contains("REGISTERED"))
        .stdout(predicate::str::contains("1 available"))
        .stdout(predicate::str::contains("1 registered"));
}

#[test]
fn test_stream_mode() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    whois_check(&home)
        .args(["taken.test", "free.test", "--stream", "--server", &server_arg(port)])
        .assert()
        .success()
        .stdout(predicate::str::contains("/2]"))
        .stdout(predicate::str::contains("2 domains"));
}

#[test]
fn test_stdin_input_skips_comments() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    whois_check(&home)
        .args(["--json", "--server", &server_arg(port)])
        .write_stdin("# candidates\nfree.test\n\ntaken.test\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"domain\": \"free.test\""))
        .stdout(predicate::str::contains("\"domain\": \"taken.test\""))
        .stdout(predicate::str::contains("candidates").not());
}

#[test]
fn test_file_input() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();
    let file = create_test_domains_file("free.test\ntaken.test # inline comment\n");

    whois_check(&home)
        .args(["--csv", "--server", &server_arg(port), "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("free.test,available"))
        .stdout(predicate::str::contains("taken.test,registered"));
}

#[test]
fn test_single_txt_argument_is_read_as_file() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();
    fs::write(home.path().join("names.txt"), "free.test\n").unwrap();

    whois_check(&home)
        .args(["names.txt", "--csv", "--server", &server_arg(port)])
        .assert()
        .success()
        .stdout(predicate::str::contains("free.test,available"));
}

#[test]
fn test_config_file_servers_section() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();
    let config = home.path().join("custom.toml");
    fs::write(
        &config,
        format!("[servers]\ntest = \"127.0.0.1:{}\"\n\n[output]\ndefault_format = \"csv\"\n", port),
    )
    .unwrap();

    whois_check(&home)
        .args(["taken.test", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("taken.test,registered,2031-02-03"));
}

#[test]
fn test_invalid_config_file_error() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "[defaults]\nconcurrency = 0\n").unwrap();

    whois_check(&home)
        .args(["example.com", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_env_json_output() {
    let home = TempDir::new().unwrap();
    let port = spawn_fake_whois();

    whois_check(&home)
        .env("WC_JSON", "true")
        .args(["free.test", "--server", &server_arg(port)])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"available\""));
}
