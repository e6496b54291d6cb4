//! Creating a cookbook from another server's copy of it.

mod common;

use common::{checksum_of, Fixture};
use cookbook_fs::error::{FsError, TransportError};
use cookbook_fs::fs::{CookbookSource, UploadOptions};
use cookbook_fs::rest::memory::Method;
use cookbook_fs::rest::{RestClient, RestConnector, RestOptions};
use serde_json::{json, Value};
use serial_test::serial;
use std::fs;

fn file_paths(manifest: &Value) -> Vec<String> {
    manifest["all_files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap().to_string())
        .collect()
}

async fn seed_upload(fx: &Fixture, name: &str, version: &str) {
    let source = fx.json_cookbook(name, version);
    fx.cookbooks
        .create_child_from(&source, &UploadOptions::default())
        .await
        .unwrap();
}

fn raw_client(fx: &Fixture) -> std::sync::Arc<dyn RestClient> {
    fx.connector
        .connect("memory://server", RestOptions::default())
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_copy_between_servers() {
    let origin = Fixture::new();
    let target = Fixture::new();
    seed_upload(&origin, "apache2", "1.0.0").await;
    let recipe = origin.cookbook_path("apache2").join("recipes/default.rb");

    let source = origin.cookbooks.fetch_child("apache2", "1.0.0").await.unwrap();
    assert_eq!(source.name(), "apache2");
    assert_eq!(source.version(), "1.0.0");
    assert_eq!(
        fs::read(source.root_dir().join("recipes/default.rb")).unwrap(),
        fs::read(&recipe).unwrap()
    );

    target
        .cookbooks
        .create_child_from(&source, &UploadOptions::default())
        .await
        .unwrap();

    let copied = target.server.cookbook("apache2", "1.0.0").unwrap();
    let original = origin.server.cookbook("apache2", "1.0.0").unwrap();
    assert_eq!(file_paths(&copied), file_paths(&original));
    assert_eq!(
        target.server.stored_file(&checksum_of(&recipe)).unwrap(),
        fs::read(&recipe).unwrap()
    );
    assert_eq!(
        origin
            .server
            .request_count(Method::Get, &format!("memory://upload/{}", checksum_of(&recipe))),
        1
    );
}

#[tokio::test]
#[serial]
async fn test_fetched_copy_removed_on_drop() {
    let origin = Fixture::new();
    seed_upload(&origin, "apache2", "1.0.0").await;

    let source = origin.cookbooks.fetch_child("apache2", "1.0.0").await.unwrap();
    assert_eq!(origin.staging_entries(), 1);
    assert!(source.parent_file_path().starts_with(origin.staging.path()));
    drop(source);
    assert_eq!(origin.staging_entries(), 0);
}

#[tokio::test]
async fn test_missing_version_is_not_found() {
    let origin = Fixture::new();
    origin.server.add_cookbook("apache2", "1.0.0", false);

    let err = origin
        .cookbooks
        .fetch_child("apache2", "9.9.9")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, FsError::NotFound { ref entry, .. } if entry == "/cookbooks/apache2"));
}

#[tokio::test]
async fn test_manifest_without_metadata_file_gets_one() {
    let origin = Fixture::new();
    let client = raw_client(&origin);
    let content = b"package 'nginx'".to_vec();
    let checksum = hex::encode(blake3::hash(&content).as_bytes());
    client
        .put_bytes(&format!("memory://upload/{}", checksum), content)
        .await
        .unwrap();
    client
        .put_json(
            "cookbooks/nginx/2.0.0",
            &json!({
                "metadata": { "name": "nginx", "version": "2.0.0" },
                "all_files": [{ "path": "recipes/default.rb", "checksum": checksum }],
            }),
        )
        .await
        .unwrap();

    let source = origin.cookbooks.fetch_child("nginx", "2.0.0").await.unwrap();
    let cookbook = source.chef_object().unwrap();
    assert_eq!(cookbook.name(), "nginx");
    assert_eq!(cookbook.version(), "2.0.0");
}

#[tokio::test]
async fn test_unsafe_manifest_path_rejected() {
    let origin = Fixture::new();
    let client = raw_client(&origin);
    client
        .put_bytes("memory://upload/abc", b"x".to_vec())
        .await
        .unwrap();
    client
        .put_json(
            "cookbooks/evil/1.0.0",
            &json!({ "all_files": [{ "path": "../../outside.rb", "checksum": "abc" }] }),
        )
        .await
        .unwrap();

    let err = origin
        .cookbooks
        .fetch_child("evil", "1.0.0")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, FsError::Transport(TransportError::InvalidResponse(_))));
    assert_eq!(origin.staging_entries(), 0);
}

#[tokio::test]
async fn test_checksum_mismatch_rejected() {
    let origin = Fixture::new();
    let client = raw_client(&origin);
    client
        .put_bytes("memory://upload/not-the-hash", b"tampered".to_vec())
        .await
        .unwrap();
    client
        .put_json(
            "cookbooks/apache2/1.0.0",
            &json!({ "all_files": [{ "path": "recipes/default.rb", "checksum": "not-the-hash" }] }),
        )
        .await
        .unwrap();

    let err = origin
        .cookbooks
        .fetch_child("apache2", "1.0.0")
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("checksum mismatch"));
}
