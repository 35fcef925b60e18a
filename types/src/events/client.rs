use crate::pace::Pace;

/// `start` event
///
/// Must be the first frame on a freshly opened channel.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartEvent {
    /// The learner's preferred speech pace
    pace: Pace,
}

impl StartEvent {
    pub fn new(pace: Pace) -> Self {
        Self { pace }
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }
}

/// `setPace` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SetPaceEvent {
    /// The new speech pace
    pace: Pace,
}

impl SetPaceEvent {
    pub fn new(pace: Pace) -> Self {
        Self { pace }
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }
}
