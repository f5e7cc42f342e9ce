use crate::engine::animation::AnimationOpts;
use crate::export::ExportOpts;
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::timer::backend::TimerBackendKind;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// File-level configuration: playback, export, and which timer adapter to install when the
/// surface has no native timer.
///
/// Every section is optional in JSON; missing fields take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CadenzaConfig {
    pub animation: AnimationOpts,
    pub export: ExportOpts,
    pub timer_backend: TimerBackendKind,
}

impl CadenzaConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> CadenzaResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| CadenzaError::config(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CadenzaResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            CadenzaError::config(format!("open config JSON '{}': {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> CadenzaResult<()> {
        self.animation.validate()?;
        self.export.validate()
    }
}
