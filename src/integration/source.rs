//! Frame sources.

use crate::integration::Frame;

/// Sequential frame producer.
pub trait FrameSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Next frame in presentation order, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;

    /// Nominal capture rate, when known.
    fn frame_rate(&self) -> Option<f64> {
        None
    }

    /// Live sources are never waited on for detection results.
    fn is_live(&self) -> bool {
        false
    }
}

/// How a source is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Recorded video or image sequence, every frame matters.
    File,
    /// Network stream or camera, real time matters.
    Live,
}

impl SourceKind {
    /// Classify a source by its URI scheme.
    pub fn from_uri(uri: &str) -> Self {
        let uri = uri.trim_start().to_ascii_lowercase();
        let live = ["rtsp://", "http://", "https://"]
            .iter()
            .any(|scheme| uri.starts_with(scheme));

        if live { Self::Live } else { Self::File }
    }

    #[inline]
    pub fn is_live(self) -> bool {
        self == Self::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_uri() {
        assert_eq!(SourceKind::from_uri("rtsp://cam/stream"), SourceKind::Live);
        assert_eq!(SourceKind::from_uri("HTTP://host/mjpg"), SourceKind::Live);
        assert_eq!(SourceKind::from_uri("https://host/a.m3u8"), SourceKind::Live);
        assert_eq!(SourceKind::from_uri("test.mp4"), SourceKind::File);
        assert_eq!(SourceKind::from_uri("/data/http_dump.avi"), SourceKind::File);
        assert!(!SourceKind::from_uri("images.txt").is_live());
    }
}
