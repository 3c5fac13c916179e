//! Property-based tests for configuration validation, manifest lookup and
//! seed rendering.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use proptest::prelude::*;

use tdx_guest_image::domain::config::{GuestIdentity, validate_output_name};
use tdx_guest_image::domain::error::ConfigError;
use tdx_guest_image::domain::manifest::ChecksumManifest;
use tdx_guest_image::domain::seed::CloudInitSeed;

fn config_error(err: &anyhow::Error) -> &ConfigError {
    err.downcast_ref::<ConfigError>().expect("ConfigError")
}

// ============================================================================
// validate_output_name()
// ============================================================================

proptest! {
    /// Any name ending in .qcow2 that differs from the cloud image is accepted.
    #[test]
    fn prop_qcow2_names_accepted(stem in "[a-zA-Z0-9_-]{1,30}", dir in "(/[a-z]{1,8}){0,3}") {
        let path = PathBuf::from(format!("{dir}/{stem}.qcow2"));
        prop_assert!(validate_output_name(&path, "ubuntu-24.04-server-cloudimg-amd64.img").is_ok());
    }

    /// Any other extension is rejected with the suffix error.
    #[test]
    fn prop_other_suffixes_rejected(stem in "[a-z]{1,20}", ext in "(img|raw|qcow|vmdk|qcow2x)") {
        let path = PathBuf::from(format!("/work/{stem}.{ext}"));
        let err = validate_output_name(&path, "base.img").expect_err("wrong suffix");
        prop_assert!(matches!(config_error(&err), ConfigError::OutputSuffix(_)));
    }

    /// An output whose file name equals the cloud image name is rejected,
    /// whatever directory it is in.
    #[test]
    fn prop_collision_rejected_in_any_directory(name in "[a-z]{1,20}\\.qcow2", dir in "(/[a-z]{1,8}){0,3}") {
        let path = PathBuf::from(format!("{dir}/{name}"));
        let err = validate_output_name(&path, &name).expect_err("collision");
        prop_assert!(matches!(
            config_error(&err),
            ConfigError::OutputCollidesWithCloudImage(_)
        ));
    }
}

// ============================================================================
// ChecksumManifest
// ============================================================================

proptest! {
    /// Lookup is by exact name: a file absent from the manifest is never
    /// matched, even when another entry contains it as a substring.
    #[test]
    fn prop_absent_name_never_found(
        names in proptest::collection::vec("[a-z]{3,12}\\.img", 1..8),
        missing in "[a-z]{3,12}\\.img",
    ) {
        let body: String = names
            .iter()
            .map(|n| format!("{}  long-{n}\n", "a".repeat(64)))
            .collect();
        let manifest = ChecksumManifest::parse(&body);
        prop_assert_eq!(manifest.lookup(&missing), None);
    }

    /// Both text (`  name`) and binary (` *name`) entries resolve.
    #[test]
    fn prop_listed_name_found(hash in "[0-9a-f]{64}", name in "[a-z0-9.-]{1,40}", binary in proptest::bool::ANY) {
        let sep = if binary { " *" } else { "  " };
        let manifest = ChecksumManifest::parse(&format!("{hash}{sep}{name}\n"));
        prop_assert_eq!(manifest.lookup(&name), Some(hash.as_str()));
    }
}

// ============================================================================
// CloudInitSeed::render()
// ============================================================================

proptest! {
    /// Any printable password survives rendering and parses back unchanged.
    #[test]
    fn prop_password_round_trips_through_yaml(password in "[ -~]{1,40}") {
        let guest = GuestIdentity {
            username: "tdx".into(),
            password: password.clone(),
            hostname: "tdx-guest".into(),
        };
        let seed = CloudInitSeed::render("#cloud-config\n", "", &guest).expect("render");
        let doc: serde_yaml::Value = serde_yaml::from_str(&seed.user_data).expect("yaml");
        prop_assert_eq!(doc["password"].as_str(), Some(password.as_str()));
        prop_assert!(seed.user_data.ends_with("chpasswd: { expire: False }\n"), "user_data must end with chpasswd line");
    }
}
