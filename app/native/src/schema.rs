//! JSON Schema for the configuration file.

use crate::config::MuscleConfig;

/// Generates the JSON Schema for the Muscle configuration.
///
/// The schema includes every option with its type, description and default.
#[must_use]
pub fn generate_schema() -> schemars::Schema { schemars::schema_for!(MuscleConfig) }

/// Pretty-printed schema, ready for `muscle schema > muscle.schema.json`.
#[must_use]
pub fn print_schema() -> String {
    serde_json::to_string_pretty(&generate_schema()).unwrap_or_default()
}
