use serde::Serialize;
use std::fmt;

/// Machine state shown on the overview's status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    On,
    /// Powered but not cutting.
    Ideal,
    #[default]
    Off,
}

impl MachineStatus {
    /// Read a reported status. Anything unrecognised counts as off.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" => Self::On,
            "ideal" => Self::Ideal,
            _ => Self::Off,
        }
    }

    /// Indicator lamp colour.
    pub fn color(self) -> &'static str {
        match self {
            Self::On => "green",
            Self::Ideal => "yellow",
            Self::Off => "red",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::On => "On",
            Self::Ideal => "Ideal",
            Self::Off => "Off",
        };
        write!(f, "Machine Status: {label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_lenient() {
        assert_eq!(MachineStatus::parse("on"), MachineStatus::On);
        assert_eq!(MachineStatus::parse(" IDEAL "), MachineStatus::Ideal);
        assert_eq!(MachineStatus::parse("maintenance"), MachineStatus::Off);
    }

    #[test]
    fn label_and_lamp() {
        assert_eq!(MachineStatus::default().to_string(), "Machine Status: Off");
        assert_eq!(MachineStatus::Off.color(), "red");
        assert_eq!(MachineStatus::Ideal.color(), "yellow");
        assert_eq!(MachineStatus::On.to_string(), "Machine Status: On");
        assert_eq!(serde_json::to_value(MachineStatus::On).unwrap(), "on");
    }
}
