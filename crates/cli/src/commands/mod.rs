//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::Result;
use contracts::StreamerConfig;

use crate::error::CliError;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load a configuration file, mapping loader failures to `CliError`
fn load_config(path: &Path) -> Result<StreamerConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_invalid(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/streamer.toml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_config_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[globals]\nscale = -1.0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigInvalid { .. })
        ));
    }
}
