use crate::controller::ButtonType;
use serde::{Deserialize, Serialize};

/// Which gamepad controls trigger the drive toggles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    pub cycle_drive_mode: ButtonType,
    pub toggle_squares: ButtonType,
    pub toggle_quick_turn: ButtonType,
    pub zero_heading: ButtonType,
    /// Switches between full and slow scaling.
    pub toggle_scaling: ButtonType,
    /// POV angles (degrees) that step the scaling up and down.
    pub scaling_up_pov: u16,
    pub scaling_down_pov: u16,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            cycle_drive_mode: ButtonType::Start,
            toggle_squares: ButtonType::Y,
            toggle_quick_turn: ButtonType::RightStick,
            zero_heading: ButtonType::Select,
            toggle_scaling: ButtonType::LeftStick,
            scaling_up_pov: 0,
            scaling_down_pov: 180,
        }
    }
}

impl BindingsConfig {
    pub fn buttons(&self) -> [ButtonType; 5] {
        [
            self.cycle_drive_mode,
            self.toggle_squares,
            self.toggle_quick_turn,
            self.zero_heading,
            self.toggle_scaling,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_single_binding() {
        let bindings: BindingsConfig = toml::from_str("toggle_scaling = \"A\"").unwrap();
        assert_eq!(bindings.toggle_scaling, ButtonType::A);
        assert_eq!(bindings.cycle_drive_mode, ButtonType::Start);
        assert_eq!(bindings.scaling_down_pov, 180);
    }
}
