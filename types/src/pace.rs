use std::fmt;

/// Speech speed multiplier chosen by the learner.
///
/// Only the four values offered by the pace selector are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum Pace {
    Slow,
    Normal,
    Brisk,
    Fast,
}

impl Pace {
    pub const ALL: [Pace; 4] = [Pace::Slow, Pace::Normal, Pace::Brisk, Pace::Fast];

    pub fn multiplier(self) -> f32 {
        match self {
            Pace::Slow => 0.75,
            Pace::Normal => 1.0,
            Pace::Brisk => 1.25,
            Pace::Fast => 1.5,
        }
    }
}

impl From<Pace> for f32 {
    fn from(pace: Pace) -> Self {
        pace.multiplier()
    }
}

/// Returned when a multiplier is not one of [`Pace::ALL`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidPace(pub f32);

impl fmt::Display for InvalidPace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported pace {} (expected 0.75, 1, 1.25 or 1.5)", self.0)
    }
}

impl std::error::Error for InvalidPace {}

impl TryFrom<f32> for Pace {
    type Error = InvalidPace;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Pace::ALL
            .into_iter()
            .find(|pace| (pace.multiplier() - value).abs() < 1e-3)
            .ok_or(InvalidPace(value))
    }
}

impl std::str::FromStr for Pace {
    type Err = InvalidPace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .trim_end_matches('x')
            .parse::<f32>()
            .map_err(|_| InvalidPace(f32::NAN))?;
        Pace::try_from(value)
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}
