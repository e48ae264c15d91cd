use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crossterm::event::KeyModifiers;
use thiserror::Error;
use tracing::Level;

use crate::constants::{
    BORDER_INSET, BORDER_OUTSET, GUIDE_HALF_THICKNESS, MAX_REINSTALL_DEBOUNCE, REINSTALL_DEBOUNCE,
};

/// Host platform family; decides which modifier distorts a selection and
/// whether control-click needs capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Mac,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }

    /// Command on macOS, control elsewhere.
    pub fn distort_modifier(self) -> KeyModifiers {
        match self {
            Platform::Mac => KeyModifiers::SUPER,
            Platform::Other => KeyModifiers::CONTROL,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Mac => write!(f, "mac"),
            Platform::Other => write!(f, "other"),
        }
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mac" | "macos" => Ok(Platform::Mac),
            "other" | "win" | "windows" | "linux" => Ok(Platform::Other),
            _ => Err(ConfigError::UnknownPlatform(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("border inset must be positive, got {0}")]
    Inset(i32),
    #[error("border outset ({outset}) must not be smaller than the inset ({inset})")]
    Outset { inset: i32, outset: i32 },
    #[error("guide half-thickness must be positive, got {0}")]
    GuideThickness(i32),
    #[error("debounce must be at most {max:?}, got {got:?}")]
    Debounce { got: Duration, max: Duration },
    #[error("unknown platform {0:?}")]
    UnknownPlatform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterConfig {
    pub border_inset: i32,
    pub border_outset: i32,
    pub guide_half_thickness: i32,
    pub debounce: Duration,
    pub platform: Platform,
    pub log_level: Level,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            border_inset: BORDER_INSET,
            border_outset: BORDER_OUTSET,
            guide_half_thickness: GUIDE_HALF_THICKNESS,
            debounce: REINSTALL_DEBOUNCE,
            platform: Platform::current(),
            log_level: Level::INFO,
        }
    }
}

impl ArbiterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.border_inset <= 0 {
            return Err(ConfigError::Inset(self.border_inset));
        }
        if self.border_outset < self.border_inset {
            return Err(ConfigError::Outset {
                inset: self.border_inset,
                outset: self.border_outset,
            });
        }
        if self.guide_half_thickness <= 0 {
            return Err(ConfigError::GuideThickness(self.guide_half_thickness));
        }
        if self.debounce > MAX_REINSTALL_DEBOUNCE {
            return Err(ConfigError::Debounce {
                got: self.debounce,
                max: MAX_REINSTALL_DEBOUNCE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArbiterConfig::default();
        assert_eq!(config.border_inset, 4);
        assert_eq!(config.border_outset, 27);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn outset_below_inset_is_rejected() {
        let config = ArbiterConfig {
            border_outset: 2,
            ..ArbiterConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Outset {
                inset: 4,
                outset: 2
            })
        );
    }

    #[test]
    fn long_debounce_is_rejected() {
        let config = ArbiterConfig {
            debounce: Duration::from_secs(10),
            ..ArbiterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Debounce { .. })));
    }

    #[test]
    fn platform_parsing_and_modifiers() {
        assert_eq!("macOS".parse::<Platform>().unwrap(), Platform::Mac);
        assert_eq!("windows".parse::<Platform>().unwrap(), Platform::Other);
        assert!("beos".parse::<Platform>().is_err());
        assert_eq!(Platform::Mac.distort_modifier(), KeyModifiers::SUPER);
        assert_eq!(Platform::Other.distort_modifier(), KeyModifiers::CONTROL);
    }
}
