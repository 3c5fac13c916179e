//! Cloud-init NoCloud seed rendering.
//!
//! Templates are copied, never edited: the rendered text is the template
//! followed by a generated block. Values are emitted as YAML scalars so a
//! password such as `a: b` cannot break the document.

use anyhow::Result;

use crate::domain::config::GuestIdentity;
use crate::domain::error::ConfigError;

/// Volume label cloud-init's NoCloud datasource looks for.
pub const SEED_VOLUME_ID: &str = "cidata";
pub const USER_DATA: &str = "user-data";
pub const META_DATA: &str = "meta-data";

/// Default templates shipped with the binary, used when the tools directory
/// has none.
pub const DEFAULT_USER_DATA_TEMPLATE: &str =
    include_str!("../../assets/cloud-init-data/user-data.template");
pub const DEFAULT_META_DATA_TEMPLATE: &str =
    include_str!("../../assets/cloud-init-data/meta-data.template");

/// Rendered `(user-data, meta-data)` pair for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInitSeed {
    pub user_data: String,
    pub meta_data: String,
}

impl CloudInitSeed {
    /// Render both files from their templates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSeed`] when either result is not a YAML
    /// mapping, e.g. because the template already defines `user:`.
    pub fn render(
        user_data_template: &str,
        meta_data_template: &str,
        guest: &GuestIdentity,
    ) -> Result<Self> {
        let user_data = append_block(
            user_data_template,
            &[
                format!("user: {}", yaml_scalar(&guest.username)?),
                format!("password: {}", yaml_scalar(&guest.password)?),
                "chpasswd: { expire: False }".to_string(),
            ],
        );
        let meta_data = append_block(
            meta_data_template,
            &[format!("local-hostname: {}", yaml_scalar(&guest.hostname)?)],
        );
        ensure_mapping(USER_DATA, &user_data)?;
        ensure_mapping(META_DATA, &meta_data)?;
        Ok(Self {
            user_data,
            meta_data,
        })
    }
}

fn append_block(template: &str, lines: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    out.push_str(template);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Serialize `value` as a single-line YAML scalar, quoting only when needed.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn yaml_scalar(value: &str) -> Result<String> {
    let s = serde_yaml::to_string(value)?;
    Ok(s.trim_end_matches('\n').to_string())
}

fn ensure_mapping(file: &'static str, text: &str) -> Result<()> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::InvalidSeed {
            file,
            reason: e.to_string(),
        })?;
    if !value.is_mapping() {
        return Err(ConfigError::InvalidSeed {
            file,
            reason: "top level is not a mapping".to_string(),
        }
        .into());
    }
    Ok(())
}
