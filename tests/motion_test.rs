use std::collections::VecDeque;
use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use flowtrack_rs::{
    Detection, Detector, ExitFlag, Frame, FrameSink, FrameSource, MotionConfig, MotionEstimator,
    OpticalFlowEstimator, PipelineConfig, Scheduler,
};
use image::{Rgb, RgbImage};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn texture(x: f32, y: f32) -> f32 {
    128.0 + 60.0 * (x / 7.0).sin() + 60.0 * (y / 9.0).cos()
}

/// Texture translated by `(dx, dy)` pixels.
fn textured_frame(dx: f32, dy: f32) -> Frame {
    Frame::new(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let v = texture(x as f32 - dx, y as f32 - dy).round() as u8;
        Rgb([v, v, v])
    }))
}

#[test]
fn test_flow_follows_translated_texture() {
    let mut estimator = OpticalFlowEstimator::new(MotionConfig {
        enabled: true,
        ..MotionConfig::default()
    });

    let mut det = Detection::new(60, 50, 20, 20, 0, 0.9);
    det.track_id = 7;
    estimator.prime(&textured_frame(0.0, 0.0), &[det]);

    let moved = estimator.advance(&textured_frame(3.0, 2.0));
    assert_eq!(moved.len(), 1);
    assert_eq!((moved[0].x, moved[0].y), (63, 52));
    assert_eq!((moved[0].w, moved[0].h), (20, 20));
    assert_eq!(moved[0].track_id, 7);

    // the tracked set rolls forward
    let moved = estimator.advance(&textured_frame(6.0, 4.0));
    assert_eq!((moved[0].x, moved[0].y), (66, 54));
}

#[test]
fn test_flow_tolerates_resolution_change() {
    let mut estimator = OpticalFlowEstimator::new(MotionConfig::default());
    let det = Detection::new(60, 50, 20, 20, 0, 0.9);
    estimator.prime(&textured_frame(0.0, 0.0), &[det]);

    let out = estimator.advance(&Frame::blank(80, 60));
    assert_eq!(out, vec![det]);
}

/// Texture sliding right by `SPEED` pixels per frame.
const SPEED: u32 = 2;

struct SlidingSource {
    next: u32,
    count: u32,
    live: bool,
    delay: Duration,
}

impl SlidingSource {
    fn file(count: u32) -> Self {
        Self {
            next: 0,
            count,
            live: false,
            delay: Duration::ZERO,
        }
    }

    fn live(count: u32, delay: Duration) -> Self {
        Self {
            live: true,
            delay,
            ..Self::file(count)
        }
    }
}

impl FrameSource for SlidingSource {
    type Error = Infallible;

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        if self.next == self.count {
            return Ok(None);
        }
        thread::sleep(self.delay);
        let frame = textured_frame((self.next * SPEED) as f32, 0.0);
        self.next += 1;
        Ok(Some(frame))
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Reports the true box position of the frame it is given.
#[derive(Default)]
struct OracleDetector {
    delay: Duration,
}

impl Detector for OracleDetector {
    type Error = Infallible;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        thread::sleep(self.delay);
        let x = 40 + SPEED * frame.index() as u32;
        Ok(vec![Detection::new(x, 40, 30, 30, 0, 0.9)])
    }

    fn input_width(&self) -> u32 {
        WIDTH
    }

    fn input_height(&self) -> u32 {
        HEIGHT
    }
}

#[derive(Default)]
struct Collect {
    written: VecDeque<(u64, Vec<Detection>)>,
    delay: Duration,
}

impl FrameSink for Collect {
    type Error = Infallible;

    fn write(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error> {
        thread::sleep(self.delay);
        self.written.push_back((frame.index(), detections.to_vec()));
        Ok(())
    }
}

#[test]
fn test_scheduler_moves_boxes_between_detections() {
    let config = PipelineConfig {
        motion: MotionConfig {
            enabled: true,
            ..MotionConfig::default()
        },
        draw_overlay: false,
        ..PipelineConfig::default()
    };
    let mut scheduler = Scheduler::new(OracleDetector::default(), config).unwrap();
    let mut source = SlidingSource::file(10);
    let mut sink = Collect::default();

    let report = scheduler.run(&mut source, &mut sink, &ExitFlag::new()).unwrap();
    assert_eq!(report.frames, 10);
    assert_eq!(sink.written.len(), 10);

    // each frame shows the previous result carried forward by optical flow
    for (index, dets) in sink.written.iter().skip(1) {
        assert_eq!(dets.len(), 1, "frame {index}");
        let expected = 40 + SPEED * *index as u32;
        assert!(dets[0].x.abs_diff(expected) <= 1, "frame {index}: {:?}", dets[0]);
        assert_eq!(dets[0].y, 40);
    }
}

#[test]
fn test_scheduler_extrapolates_without_flow() {
    let config = PipelineConfig {
        extrapolate: true,
        draw_overlay: false,
        ..PipelineConfig::default()
    };
    let mut scheduler = Scheduler::new(OracleDetector::default(), config).unwrap();
    let mut source = SlidingSource::file(8);
    let mut sink = Collect::default();

    scheduler.run(&mut source, &mut sink, &ExitFlag::new()).unwrap();

    // two results are needed before a velocity exists
    for (index, dets) in sink.written.iter().skip(2) {
        assert_eq!(dets.len(), 1, "frame {index}");
        assert_eq!(dets[0].x, 40 + SPEED * *index as u32, "frame {index}");
    }
}

#[test]
fn test_live_stream_catches_up_and_drops_busy_encodes() {
    let config = PipelineConfig {
        motion: MotionConfig {
            enabled: true,
            ..MotionConfig::default()
        },
        draw_overlay: false,
        ..PipelineConfig::default()
    };
    let detector = OracleDetector {
        delay: Duration::from_millis(40),
    };
    let mut scheduler = Scheduler::new(detector, config).unwrap();
    let mut source = SlidingSource::live(40, Duration::from_millis(3));
    let mut sink = Collect {
        delay: Duration::from_millis(30),
        ..Collect::default()
    };

    let report = scheduler.run(&mut source, &mut sink, &ExitFlag::new()).unwrap();
    assert_eq!(report.frames, 40);
    assert!(report.frames_written < report.frames);
    assert_eq!(report.frames_written as usize, sink.written.len());

    // results computed on older frames are replayed up to the frame shown
    let tracked: Vec<_> = sink.written.iter().filter(|(_, dets)| !dets.is_empty()).collect();
    assert!(!tracked.is_empty());
    let track_id = tracked[0].1[0].track_id;
    for (index, dets) in tracked {
        assert_eq!(dets.len(), 1, "frame {index}");
        let expected = 40 + SPEED * *index as u32;
        assert!(dets[0].x.abs_diff(expected) <= 1, "frame {index}: {:?}", dets[0]);
        assert_eq!(dets[0].track_id, track_id);
    }
}
