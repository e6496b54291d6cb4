//! Command parsing and output contracts of the CLI.

mod common;

use clap::Parser;
use common::Fixture;
use cookbook_fs::config::ChefFsConfig;
use cookbook_fs::error::TransportError;
use cookbook_fs::rest::memory::Method;
use cookbook_fs::tooling::cli::{Cli, CliContext, Commands};
use serial_test::serial;

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["cookbook-fs", "list"],
        vec!["cookbook-fs", "list", "--format", "json"],
        vec!["cookbook-fs", "show", "apache2"],
        vec!["cookbook-fs", "upload", "./apache2"],
        vec!["cookbook-fs", "upload", "./apache2", "./mysql", "--freeze", "--force"],
        vec!["cookbook-fs", "--config", "cfg.toml", "--log-level", "debug", "list"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_upload_requires_path() {
    assert!(Cli::try_parse_from(["cookbook-fs", "upload"]).is_err());
}

#[test]
fn cli_overrides_logging_config() {
    let cli = Cli::try_parse_from(["cookbook-fs", "--log-level", "debug", "list"]).unwrap();
    let logging = cli.logging_config(&ChefFsConfig::default());
    assert_eq!(logging.level, "debug");
    assert_eq!(logging.format, "text");
}

#[test]
fn context_requires_server_url() {
    let err = CliContext::new(&ChefFsConfig::default()).err().unwrap();
    assert!(err.to_string().contains("server.url"));
}

#[tokio::test]
async fn list_json_contract_has_required_fields() {
    let fx = Fixture::new();
    fx.server.add_cookbook("mysql", "1.0.0", false);
    fx.server.add_cookbook("apache2", "1.0.0", false);
    let cli = CliContext::with_root(fx.root.clone());

    let output = cli
        .execute(&Commands::List {
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["total"], 2);
    assert_eq!(parsed["cookbooks"], serde_json::json!(["apache2", "mysql"]));
}

#[tokio::test]
async fn list_text_renders_table() {
    let fx = Fixture::new();
    fx.server.add_cookbook("apache2", "1.0.0", false);
    let cli = CliContext::with_root(fx.root.clone());

    let output = cli
        .execute(&Commands::List {
            format: "text".to_string(),
        })
        .await
        .unwrap();
    assert!(output.contains("Cookbook"));
    assert!(output.contains("/cookbooks/apache2"));

    let err = cli
        .execute(&Commands::List {
            format: "yaml".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid format"));
}

#[tokio::test]
async fn show_reports_presence() {
    let fx = Fixture::new();
    fx.server.add_cookbook("apache2", "1.0.0", false);
    let cli = CliContext::with_root(fx.root.clone());

    let present = cli
        .execute(&Commands::Show {
            name: "apache2".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(present, "/cookbooks/apache2: present");

    let absent = cli
        .execute(&Commands::Show {
            name: "nginx".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(absent, "/cookbooks/nginx: absent");
    assert_eq!(fx.server.request_count(Method::Get, "cookbooks"), 1);
}

#[tokio::test]
#[serial]
async fn upload_then_list() {
    let fx = Fixture::new();
    fx.json_cookbook("apache2", "1.0.0");
    let cli = CliContext::with_root(fx.root.clone());

    let output = cli
        .execute(&Commands::Upload {
            paths: vec![fx.cookbook_path("apache2")],
            freeze: false,
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(output, "Uploaded apache2");

    let listing = cli
        .execute(&Commands::List {
            format: "json".to_string(),
        })
        .await
        .unwrap();
    assert!(listing.contains("apache2"));
}

#[tokio::test]
#[serial]
async fn upload_frozen_suggests_force() {
    let fx = Fixture::new();
    fx.server.add_cookbook("apache2", "1.0.0", true);
    fx.json_cookbook("apache2", "1.0.0");
    let cli = CliContext::with_root(fx.root.clone());

    let err = cli
        .execute(&Commands::Upload {
            paths: vec![fx.cookbook_path("apache2")],
            freeze: false,
            force: false,
        })
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Cookbook apache2 is frozen"));
    assert!(message.contains("--force"));
}

#[tokio::test]
#[serial]
async fn upload_reports_server_errors() {
    let fx = Fixture::new();
    fx.json_cookbook("apache2", "1.0.0");
    fx.server.fail_always(
        Method::Post,
        "sandboxes",
        TransportError::Timeout {
            message: "operation timed out".to_string(),
        },
    );
    let cli = CliContext::with_root(fx.root.clone());

    let err = cli
        .execute(&Commands::Upload {
            paths: vec![fx.cookbook_path("apache2")],
            freeze: false,
            force: false,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Timeout writing: operation timed out"));
}

#[tokio::test]
async fn upload_rejects_missing_directory() {
    let fx = Fixture::new();
    let cli = CliContext::with_root(fx.root.clone());
    let err = cli
        .execute(&Commands::Upload {
            paths: vec![fx.repo.path().join("absent")],
            freeze: false,
            force: false,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Not a cookbook directory"));
}
