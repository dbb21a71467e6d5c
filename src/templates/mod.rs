//! Embedded templates for proofrun files.

/// Default `proofrun.toml` configuration.
pub(crate) const PROOFRUN_TOML: &str = include_str!("proofrun.toml");

/// `.env` example listing the credentials proofrun reads.
pub(crate) const ENV_EXAMPLE: &str = include_str!("env.example");

/// Dockerfile used to build the sandbox image around a payload.
///
/// Placeholders: `{{base_image}}`, `{{dependency}}`, `{{workdir}}`,
/// `{{script_name}}`, `{{interpreter}}`.
pub(crate) const DOCKERFILE: &str = include_str!("Dockerfile.tmpl");
