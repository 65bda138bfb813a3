//! Configuration validation
//!
//! Rules:
//! - scale > 0, finite and at most MAX_SCALE
//! - file sources name a path
//! - sink address non-empty, port non-zero
//! - smoothing_strength within 0..=100

use contracts::{ContractError, GlobalSettings, SinkSpec, SourceKind, StreamerConfig, MAX_SCALE};
use validator::{Validate, ValidationErrors};

/// Validate a StreamerConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &StreamerConfig) -> Result<(), ContractError> {
    validate_globals(&config.globals)?;
    validate_sinks(&config.sinks)?;
    Ok(())
}

fn validate_globals(globals: &GlobalSettings) -> Result<(), ContractError> {
    globals
        .validate()
        .map_err(|e| first_error("globals", &e))?;

    if !globals.scale.is_finite() {
        return Err(ContractError::config_validation(
            "globals.scale",
            format!("scale must be finite, got {}", globals.scale),
        ));
    }
    if globals.scale > MAX_SCALE {
        return Err(ContractError::config_validation(
            "globals.scale",
            format!("scale must be at most {MAX_SCALE}, got {}", globals.scale),
        ));
    }

    if let SourceKind::File { path } = &globals.source {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                "globals.source.path",
                "file source requires a path",
            ));
        }
    }
    Ok(())
}

fn validate_sinks(sinks: &[SinkSpec]) -> Result<(), ContractError> {
    for (idx, sink) in sinks.iter().enumerate() {
        sink.validate()
            .map_err(|e| first_error(&format!("sinks[{idx}]"), &e))?;

        if sink.port == Some(0) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].port"),
                "port must be non-zero",
            ));
        }
    }
    Ok(())
}

/// Flatten validator output into the first offending field path
fn first_error(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let (field, message) = first_field(errors)
        .unwrap_or_else(|| (String::new(), "invalid value".to_string()));
    let path = if field.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{field}")
    };
    ContractError::config_validation(path, message)
}

fn first_field(errors: &ValidationErrors) -> Option<(String, String)> {
    use validator::ValidationErrorsKind;

    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", err.code));
                    return Some((field.to_string(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some((sub, message)) = first_field(inner) {
                    return Some((format!("{field}.{sub}"), message));
                }
            }
            ValidationErrorsKind::List(items) => {
                if let Some((i, inner)) = items.iter().next() {
                    if let Some((sub, message)) = first_field(inner) {
                        return Some((format!("{field}[{i}].{sub}"), message));
                    }
                }
            }
        }
    }
    None
}
