mod detection;
mod extrapolator;
mod history;
mod rect;
mod track_manager;

pub use detection::{Detection, MAX_FRAMES_COUNTER};
pub use extrapolator::{CoordinateExtrapolator, ExtrapolatorConfig, PositionSample};
pub use history::HistoryRing;
pub use rect::Rect;
pub use track_manager::{TrackManager, TrackerConfig, merge_retained};
