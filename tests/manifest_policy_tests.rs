#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests for the Chain Reaction server.
//!
//! These tests parse `Cargo.toml` and check that the lint levels, feature
//! layout and targets stay the way the project agreed on. If any test fails,
//! the manifest has drifted from that policy.
//!
//! All checks are synchronous filesystem reads.

use std::path::PathBuf;

use toml::Table;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Parses the project's Cargo.toml.
fn manifest() -> Table {
    let path = project_root().join("Cargo.toml");
    let contents = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read '{}': {e}", path.display()));
    contents
        .parse::<Table>()
        .unwrap_or_else(|e| panic!("Cargo.toml is not valid TOML: {e}"))
}

fn table<'a>(root: &'a Table, key: &str) -> &'a Table {
    root.get(key)
        .and_then(|v| v.as_table())
        .unwrap_or_else(|| panic!("Cargo.toml is missing the [{key}] table"))
}

fn string_list(value: &toml::Value) -> Vec<&str> {
    value
        .as_array()
        .expect("expected an array")
        .iter()
        .map(|v| v.as_str().expect("expected a string"))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: lint_policy
// ─────────────────────────────────────────────────────────────────────────────

mod lint_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn all_panic_prone_lints_are_denied() {
        let manifest = manifest();
        let clippy = table(table(&manifest, "lints"), "clippy");

        for lint in REQUIRED_DENY_LINTS {
            assert_eq!(
                clippy.get(*lint).and_then(|v| v.as_str()),
                Some("deny"),
                "[lints.clippy] must set `{lint} = \"deny\"`. The server must \
                 never panic while handling client input."
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: feature_policy
// ─────────────────────────────────────────────────────────────────────────────

mod feature_policy {
    use super::*;

    #[test]
    fn websocket_transport_is_default() {
        let manifest = manifest();
        let features = table(&manifest, "features");
        let default = string_list(features.get("default").expect("default feature"));
        assert!(
            default.contains(&"transport-websocket"),
            "the WebSocket transport must be enabled by default"
        );
    }

    #[test]
    fn websocket_feature_gates_its_dependencies() {
        let manifest = manifest();
        let features = table(&manifest, "features");
        let websocket = string_list(
            features
                .get("transport-websocket")
                .expect("transport-websocket feature"),
        );
        for dep in ["dep:tokio-tungstenite", "dep:futures-util"] {
            assert!(
                websocket.contains(&dep),
                "transport-websocket must enable `{dep}`"
            );
        }

        let deps = table(&manifest, "dependencies");
        for name in ["tokio-tungstenite", "futures-util"] {
            let optional = deps
                .get(name)
                .and_then(|v| v.as_table())
                .and_then(|t| t.get("optional"))
                .and_then(|v| v.as_bool());
            assert_eq!(
                optional,
                Some(true),
                "`{name}` must stay optional so the core builds without networking"
            );
        }
    }

    #[test]
    fn core_tokio_features_stay_minimal() {
        let manifest = manifest();
        let tokio = table(&manifest, "dependencies")
            .get("tokio")
            .and_then(|v| v.as_table())
            .expect("tokio dependency table");
        let features = string_list(tokio.get("features").expect("tokio features"));
        assert!(
            !features.contains(&"full"),
            "the library must not enable tokio's `full` feature"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: target_policy
// ─────────────────────────────────────────────────────────────────────────────

mod target_policy {
    use super::*;

    #[test]
    fn server_binary_requires_websocket_feature() {
        let manifest = manifest();
        let bins = manifest
            .get("bin")
            .and_then(|v| v.as_array())
            .expect("Cargo.toml must declare a [[bin]] target");
        let server = bins
            .iter()
            .filter_map(|b| b.as_table())
            .find(|b| b.get("name").and_then(|n| n.as_str()) == Some("chain-reaction-server"))
            .expect("chain-reaction-server binary");

        let required = string_list(
            server
                .get("required-features")
                .expect("binary must declare required-features"),
        );
        assert_eq!(required, vec!["transport-websocket"]);
    }

    #[test]
    fn declared_target_paths_exist() {
        let manifest = manifest();
        for kind in ["bin", "example"] {
            let Some(targets) = manifest.get(kind).and_then(|v| v.as_array()) else {
                continue;
            };
            for target in targets.iter().filter_map(|t| t.as_table()) {
                let path = target
                    .get("path")
                    .and_then(|p| p.as_str())
                    .expect("target path");
                assert!(
                    project_root().join(path).is_file(),
                    "[[{kind}]] path '{path}' does not exist"
                );
            }
        }
    }

    #[test]
    fn rust_version_is_declared() {
        let manifest = manifest();
        let version = table(&manifest, "package")
            .get("rust-version")
            .and_then(|v| v.as_str())
            .expect("Cargo.toml must declare a rust-version");
        assert!(
            version.split('.').count() >= 2,
            "rust-version '{version}' should be a MAJOR.MINOR[.PATCH] version"
        );
    }
}
