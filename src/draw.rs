use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};

use crate::detection::Detection;
use crate::error::Error;
use crate::names::ClassNames;

// RGB
const PALETTE: [(u8, u8, u8); 20] = [
    (0xFF, 0x38, 0x38),
    (0xFF, 0x9D, 0x97),
    (0xFF, 0x70, 0x1F),
    (0xFF, 0xB2, 0x1D),
    (0xCF, 0xD2, 0x31),
    (0x48, 0xF9, 0x0A),
    (0x92, 0xCC, 0x17),
    (0x3D, 0xDB, 0x86),
    (0x1A, 0x93, 0x34),
    (0x00, 0xD4, 0xBB),
    (0x2C, 0x99, 0xA8),
    (0x00, 0xC2, 0xFF),
    (0x34, 0x45, 0x93),
    (0x64, 0x73, 0xFF),
    (0x00, 0x18, 0xEC),
    (0x84, 0x38, 0xFF),
    (0x52, 0x00, 0x85),
    (0xCB, 0x38, 0xFF),
    (0xFF, 0x95, 0xC8),
    (0xFF, 0x37, 0xC7),
];

/// BGR color for a class id.
pub fn class_color(class: i32) -> core::Scalar {
    let (r, g, b) = PALETTE[class.rem_euclid(PALETTE.len() as i32) as usize];

    core::Scalar::new(b as f64, g as f64, r as f64, 255.0)
}

/// Box line width, proportional to the frame size with a floor of 2 px.
pub fn line_width(cols: i32, rows: i32) -> i32 {
    (((cols + rows) as f64 / 2.0 * 0.003).round() as i32).max(2)
}

pub fn label(det: &Detection, names: &ClassNames) -> String {
    format!("{} {:.2}", names.name(det.class), det.confidence)
}

/// Draws every detection onto `frame` in place.
pub fn annotate(frame: &mut Mat, dets: &[Detection], names: &ClassNames) -> Result<(), Error> {
    let (fw, fh) = (frame.cols(), frame.rows());
    let lw = line_width(fw, fh);

    for det in dets {
        draw_pred(frame, det, names, lw)?;
    }

    Ok(())
}

fn draw_pred(frame: &mut Mat, det: &Detection, names: &ClassNames, lw: i32) -> Result<(), Error> {
    let (fw, fh) = (frame.cols(), frame.rows());
    let bbox = det.ltrb().clip(fw as f32, fh as f32).as_ltwh();

    let rect = core::Rect::new(
        bbox.left() as i32,
        bbox.top() as i32,
        bbox.width() as i32,
        bbox.height() as i32,
    );
    if rect.width <= 0 || rect.height <= 0 {
        return Ok(());
    }

    let color = class_color(det.class);

    imgproc::rectangle(frame, rect, color, lw, imgproc::LINE_AA, 0)?;

    let text = label(det, names);
    let thickness = (lw - 1).max(1);
    let scale = lw as f64 / 3.0;

    let mut base_line = 0;
    let text_size = imgproc::get_text_size(
        &text,
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        thickness,
        &mut base_line,
    )?;

    // label strip goes above the box unless it would leave the frame
    let outside = rect.y >= text_size.height + 3;
    let (strip, origin) = if outside {
        (
            core::Rect::new(
                rect.x,
                rect.y - text_size.height - 3,
                text_size.width,
                text_size.height + 3,
            ),
            core::Point::new(rect.x, rect.y - 2),
        )
    } else {
        (
            core::Rect::new(rect.x, rect.y, text_size.width, text_size.height + 3),
            core::Point::new(rect.x, rect.y + text_size.height + 2),
        )
    };

    imgproc::rectangle(frame, strip, color, imgproc::FILLED, imgproc::LINE_AA, 0)?;

    imgproc::put_text(
        frame,
        &text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        core::Scalar::new(255.0, 255.0, 255.0, 255.0),
        thickness,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}
