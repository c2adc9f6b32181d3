//! Box overlays for output frames.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::integration::Frame;
use crate::tracker::Detection;

const PALETTE: [[u32; 3]; 6] = [
    [1, 0, 1],
    [0, 0, 1],
    [0, 1, 1],
    [0, 1, 0],
    [1, 1, 0],
    [1, 0, 0],
];

/// Stable colour for a class id.
pub fn class_color(obj_id: u32) -> Rgb<u8> {
    let hash = obj_id as u64 * 123_457;
    let base = PALETTE[(hash % 6) as usize];
    let scale = 150 + (hash % 100) as u32;

    Rgb(base.map(|c| (c * scale) as u8))
}

/// Draw a two pixel frame around every detection, clipped to the frame.
pub fn draw_detections(frame: &mut Frame, detections: &[Detection]) {
    let (fw, fh) = frame.dims();

    for det in detections {
        let Some(visible) = det.rect().clip(fw, fh) else {
            continue;
        };
        let color = class_color(det.obj_id);
        let (x, y) = (visible.x as i32, visible.y as i32);
        let (w, h) = (visible.width as u32, visible.height as u32);

        for inset in 0..2u32 {
            if w <= 2 * inset || h <= 2 * inset {
                break;
            }

            let rect = Rect::at(x + inset as i32, y + inset as i32)
                .of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(frame.image_mut(), rect, color);
        }
    }
}
