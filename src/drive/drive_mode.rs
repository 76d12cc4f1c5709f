use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// How stick input is mixed into wheel outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveMode {
    #[default]
    Arcade,
    Tank,
    Curvature,
}

impl DriveMode {
    /// Arcade -> Tank -> Curvature -> Arcade.
    pub fn next(self) -> DriveMode {
        match self {
            DriveMode::Arcade => DriveMode::Tank,
            DriveMode::Tank => DriveMode::Curvature,
            DriveMode::Curvature => DriveMode::Arcade,
        }
    }
}

impl Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveMode::Arcade => write!(f, "ARCADE"),
            DriveMode::Tank => write!(f, "TANK"),
            DriveMode::Curvature => write!(f, "CURVATURE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_all_modes() {
        let mut mode = DriveMode::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, DriveMode::Arcade);
        assert_eq!(
            seen,
            vec![DriveMode::Arcade, DriveMode::Tank, DriveMode::Curvature]
        );
    }

    #[test]
    fn parses_from_config_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: DriveMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"Curvature\"").unwrap();
        assert_eq!(parsed.mode, DriveMode::Curvature);
    }
}
