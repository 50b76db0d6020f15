use crate::engine::EngineConfig;
use crate::window::{AssignerSpec, WindowConfig};

/// Internal validation, called automatically during `EngineConfig::from_str` / `load`.
pub(crate) fn validate(config: &EngineConfig) -> anyhow::Result<()> {
    if config.runtime.parallelism == 0 {
        anyhow::bail!("runtime.parallelism must be > 0");
    }
    if config.runtime.key_queue_capacity == 0 {
        anyhow::bail!("runtime.key_queue_capacity must be > 0");
    }
    if config.runtime.input_capacity == 0 {
        anyhow::bail!("runtime.input_capacity must be > 0");
    }

    if config.windows.is_empty() {
        anyhow::bail!("at least one [window.<name>] section is required");
    }
    for w in &config.windows {
        validate_window(w)?;
    }

    if config.state.sweep_interval.is_zero() {
        anyhow::bail!("state.sweep_interval must be > 0");
    }

    if config.output.sinks.is_empty() {
        anyhow::bail!("output.sinks must contain at least one sink URI");
    }
    for (i, uri) in config.output.sinks.iter().enumerate() {
        crate::output::parse_sink_uri(uri)
            .map_err(|e| anyhow::anyhow!("output.sinks[{}]: {}", i, e))?;
    }

    Ok(())
}

/// Check assigner geometry of a single resolved window.
pub fn validate_window(w: &WindowConfig) -> anyhow::Result<()> {
    match w.assigner {
        AssignerSpec::Tumbling { size, offset } => {
            if size.is_zero() {
                anyhow::bail!("window {:?}: size must be > 0", w.name);
            }
            if offset >= size {
                anyhow::bail!(
                    "window {:?}: offset ({}) must be smaller than size ({})",
                    w.name,
                    offset,
                    size,
                );
            }
        }
        AssignerSpec::Sliding {
            size,
            slide,
            offset,
        } => {
            if size.is_zero() {
                anyhow::bail!("window {:?}: size must be > 0", w.name);
            }
            if slide.is_zero() {
                anyhow::bail!("window {:?}: slide must be > 0", w.name);
            }
            if offset >= slide {
                anyhow::bail!(
                    "window {:?}: offset ({}) must be smaller than slide ({})",
                    w.name,
                    offset,
                    slide,
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
