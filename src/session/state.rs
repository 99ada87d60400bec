use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl SessionState {
    /// True while a capture device is held
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }

    /// Controls the operator may use in this state
    pub fn controls(self) -> ControlSet {
        match self {
            SessionState::Idle => ControlSet::from([Control::Record]),
            SessionState::Recording => ControlSet::from([Control::Pause, Control::Stop]),
            SessionState::Paused => ControlSet::from([Control::Resume, Control::Stop]),
            SessionState::Stopped => {
                ControlSet::from([Control::Record, Control::Play, Control::Save])
            }
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// An operator control (button)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Record,
    Pause,
    Resume,
    Stop,
    Play,
    Save,
}

/// The set of enabled controls. Anything not in the set is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlSet(BTreeSet<Control>);

impl ControlSet {
    pub fn is_enabled(&self, control: Control) -> bool {
        self.0.contains(&control)
    }

    pub fn iter(&self) -> impl Iterator<Item = Control> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[Control; N]> for ControlSet {
    fn from(controls: [Control; N]) -> Self {
        Self(controls.into_iter().collect())
    }
}

impl fmt::Display for ControlSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .iter()
            .map(|c| format!("{:?}", c).to_lowercase())
            .collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
