pub mod events;
pub mod pace;
pub mod progress;
pub mod status;

pub use events::{ClientEvent, Envelope, ServerEvent};
pub use pace::Pace;
pub use progress::{CurriculumInfo, Progress, SectionComplete, SectionOutline};
pub use status::SessionStatus;
