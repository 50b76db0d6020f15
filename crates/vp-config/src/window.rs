use serde::{Deserialize, Serialize};

use crate::types::{AssignerKind, FiringMode, HumanDuration, LatePolicy};

// ---------------------------------------------------------------------------
// WindowDefaults: deserialized from [window_defaults]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowDefaults {
    pub allowed_lateness: HumanDuration,
    pub late_policy: LatePolicy,
    pub firing: FiringMode,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            allowed_lateness: HumanDuration::from(std::time::Duration::ZERO),
            late_policy: LatePolicy::Drop,
            firing: FiringMode::Buffered,
        }
    }
}

// ---------------------------------------------------------------------------
// WindowOverride: deserialized from [window.<name>]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WindowOverride {
    pub assigner: AssignerKind,
    pub size: HumanDuration,
    pub slide: Option<HumanDuration>,
    pub offset: Option<HumanDuration>,
    pub allowed_lateness: Option<HumanDuration>,
    pub late_policy: Option<LatePolicy>,
    pub firing: Option<FiringMode>,
}

// ---------------------------------------------------------------------------
// WindowConfig: fully resolved window configuration
// ---------------------------------------------------------------------------

/// Resolved assigner geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignerSpec {
    Tumbling {
        size: HumanDuration,
        offset: HumanDuration,
    },
    Sliding {
        size: HumanDuration,
        slide: HumanDuration,
        offset: HumanDuration,
    },
}

impl AssignerSpec {
    pub fn size(&self) -> HumanDuration {
        match self {
            Self::Tumbling { size, .. } | Self::Sliding { size, .. } => *size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub name: String,
    pub assigner: AssignerSpec,
    pub allowed_lateness: HumanDuration,
    pub late_policy: LatePolicy,
    pub firing: FiringMode,
}

impl WindowOverride {
    /// Resolve this override against `defaults`, producing a fully populated [`WindowConfig`].
    pub fn resolve(self, name: String, defaults: &WindowDefaults) -> anyhow::Result<WindowConfig> {
        let assigner = resolve_assigner(self.assigner, self.size, self.slide, self.offset)?;

        Ok(WindowConfig {
            name,
            assigner,
            allowed_lateness: self.allowed_lateness.unwrap_or(defaults.allowed_lateness),
            late_policy: self.late_policy.unwrap_or(defaults.late_policy),
            firing: self.firing.unwrap_or(defaults.firing),
        })
    }
}

fn resolve_assigner(
    kind: AssignerKind,
    size: HumanDuration,
    slide: Option<HumanDuration>,
    offset: Option<HumanDuration>,
) -> anyhow::Result<AssignerSpec> {
    let offset = offset.unwrap_or_else(|| HumanDuration::from(std::time::Duration::ZERO));
    match kind {
        AssignerKind::Tumbling => {
            if slide.is_some() {
                anyhow::bail!("assigner \"tumbling\" does not take a slide");
            }
            Ok(AssignerSpec::Tumbling { size, offset })
        }
        AssignerKind::Sliding => {
            let slide =
                slide.ok_or_else(|| anyhow::anyhow!("assigner \"sliding\" requires a slide"))?;
            Ok(AssignerSpec::Sliding {
                size,
                slide,
                offset,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_defaults() -> WindowDefaults {
        WindowDefaults {
            allowed_lateness: "0s".parse().unwrap(),
            late_policy: LatePolicy::Drop,
            firing: FiringMode::Buffered,
        }
    }

    fn tumbling_override() -> WindowOverride {
        WindowOverride {
            assigner: AssignerKind::Tumbling,
            size: "10s".parse().unwrap(),
            slide: None,
            offset: None,
            allowed_lateness: None,
            late_policy: None,
            firing: None,
        }
    }

    #[test]
    fn resolve_tumbling() {
        let spec = resolve_assigner(AssignerKind::Tumbling, "10s".parse().unwrap(), None, None)
            .unwrap();
        assert_eq!(
            spec,
            AssignerSpec::Tumbling {
                size: "10s".parse().unwrap(),
                offset: Duration::ZERO.into(),
            }
        );
    }

    #[test]
    fn resolve_sliding() {
        let spec = resolve_assigner(
            AssignerKind::Sliding,
            "1m".parse().unwrap(),
            Some("10s".parse().unwrap()),
            Some("2s".parse().unwrap()),
        )
        .unwrap();
        assert_eq!(spec.size(), "1m".parse::<HumanDuration>().unwrap());
        assert!(matches!(
            spec,
            AssignerSpec::Sliding { slide, .. } if slide.as_millis_i64() == 10_000
        ));
    }

    #[test]
    fn sliding_requires_slide() {
        let size = "1m".parse().unwrap();
        assert!(resolve_assigner(AssignerKind::Sliding, size, None, None).is_err());
    }

    #[test]
    fn tumbling_rejects_slide() {
        assert!(
            resolve_assigner(
                AssignerKind::Tumbling,
                "1m".parse().unwrap(),
                Some("10s".parse().unwrap()),
                None
            )
            .is_err()
        );
    }

    #[test]
    fn override_inherits_defaults() {
        let defaults = sample_defaults();
        let wc = tumbling_override().resolve("clicks".into(), &defaults).unwrap();

        assert_eq!(wc.name, "clicks");
        assert_eq!(wc.allowed_lateness, defaults.allowed_lateness);
        assert_eq!(wc.late_policy, defaults.late_policy);
        assert_eq!(wc.firing, defaults.firing);
    }

    #[test]
    fn override_replaces_defaults() {
        let ovr = WindowOverride {
            allowed_lateness: Some("30s".parse().unwrap()),
            late_policy: Some(LatePolicy::SideOutput),
            firing: Some(FiringMode::Incremental),
            ..tumbling_override()
        };
        let wc = ovr.resolve("clicks".into(), &sample_defaults()).unwrap();

        assert_eq!(wc.allowed_lateness, "30s".parse::<HumanDuration>().unwrap());
        assert_eq!(wc.late_policy, LatePolicy::SideOutput);
        assert_eq!(wc.firing, FiringMode::Incremental);
    }
}
