use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::output::OutputConfig;
use crate::runtime::RuntimeConfig;
use crate::state::StateConfig;
use crate::validate;
use crate::window::{WindowConfig, WindowDefaults, WindowOverride};

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EngineConfigRaw {
    runtime: RuntimeConfig,
    #[serde(default)]
    window_defaults: WindowDefaults,
    #[serde(default)]
    window: HashMap<String, WindowOverride>,
    #[serde(default)]
    state: StateConfig,
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// EngineConfig (resolved, validated)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EngineConfig {
    pub runtime: RuntimeConfig,
    pub window_defaults: WindowDefaults,
    /// Resolved window definitions, sorted by name.
    pub windows: Vec<WindowConfig>,
    pub state: StateConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Read and parse a `vp.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }

    /// Look up a resolved window definition by name.
    pub fn window(&self, name: &str) -> Option<&WindowConfig> {
        self.windows.iter().find(|w| w.name == name)
    }
}

impl FromStr for EngineConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a resolved, validated [`EngineConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: EngineConfigRaw = toml::from_str(toml_str)?;

        let mut windows = Vec::with_capacity(raw.window.len());
        for (name, ovr) in raw.window {
            let wc = ovr
                .resolve(name.clone(), &raw.window_defaults)
                .map_err(|e| anyhow::anyhow!("window {name:?}: {e}"))?;
            windows.push(wc);
        }
        windows.sort_by(|a, b| a.name.cmp(&b.name));

        let config = EngineConfig {
            runtime: raw.runtime,
            window_defaults: raw.window_defaults,
            windows,
            state: raw.state,
            output: raw.output,
            logging: raw.logging,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
