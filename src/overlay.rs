use crate::types::{AnalyzedFrame, DisplaySize, FaceDetection, Frame};

const BOX_COLOR: [u8; 4] = [56, 189, 248, 255];
const LANDMARK_COLOR: [u8; 4] = [248, 113, 113, 255];
const LABEL_COLOR: [u8; 4] = [255, 255, 255, 255];
const EXPRESSION_COLOR: [u8; 4] = [134, 239, 172, 255];

const BOX_THICKNESS: i32 = 3;
const LANDMARK_RADIUS: i32 = 2;
const TEXT_SCALE: i32 = 2;
const GLYPH_ROWS: i32 = 5;
const GLYPH_ADVANCE: i32 = 6;

/// Produce the displayed surface for one tick: a fresh copy of the camera
/// frame with the current detections burned in. Starting from the raw frame
/// every call is what guarantees no annotation survives from an earlier
/// tick. Inputs are never mutated.
pub fn annotate_frame(frame: &Frame, analysis: Option<&AnalyzedFrame>) -> Vec<u8> {
    let mut surface = frame.rgba.clone();
    if let Some(analysis) = analysis {
        draw_detections(
            &mut surface,
            DisplaySize {
                width: frame.width,
                height: frame.height,
            },
            (analysis.frame_width, analysis.frame_height),
            &analysis.faces,
        );
    }
    surface
}

/// Draw every face: labeled bounding box, the landmark points, and the
/// dominant-expression annotation under the box. Detection coordinates are
/// in `source` space and get rescaled to `display`.
pub fn draw_detections(
    surface: &mut [u8],
    display: DisplaySize,
    source: (u32, u32),
    faces: &[FaceDetection],
) {
    if source.0 == 0 || source.1 == 0 {
        return;
    }
    let sx = display.width as f32 / source.0 as f32;
    let sy = display.height as f32 / source.1 as f32;
    let (w, h) = (display.width, display.height);

    for face in faces {
        let [bx1, by1, bx2, by2] = face.bbox;
        let (x1, y1, x2, y2) = (bx1 * sx, by1 * sy, bx2 * sx, by2 * sy);

        draw_rect(surface, w, h, x1, y1, x2, y2, BOX_COLOR, BOX_THICKNESS);

        let label_y = y1 as i32 - GLYPH_ROWS * TEXT_SCALE - 4;
        draw_text(surface, w, h, x1 as i32, label_y, &face.box_label(), LABEL_COLOR);

        for &(lx, ly) in &face.landmarks {
            draw_circle(
                surface,
                w,
                h,
                ((lx * sx) as i32, (ly * sy) as i32),
                LANDMARK_RADIUS,
                LANDMARK_COLOR,
            );
        }

        draw_text(
            surface,
            w,
            h,
            x1 as i32,
            y2 as i32 + 4,
            face.expressions.dominant().label(),
            EXPRESSION_COLOR,
        );
    }
}

fn draw_rect(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    color: [u8; 4],
    thickness: i32,
) {
    draw_line(buffer, width, height, &(x1, y1), &(x2, y1), color, thickness);
    draw_line(buffer, width, height, &(x2, y1), &(x2, y2), color, thickness);
    draw_line(buffer, width, height, &(x2, y2), &(x1, y2), color, thickness);
    draw_line(buffer, width, height, &(x1, y2), &(x1, y1), color, thickness);
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: &(f32, f32),
    p1: &(f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(buffer, width, height, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox == 0 && oy == 0 {
                        continue;
                    }
                    if ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(buffer, width, height, x0 + ox, y0 + oy, color);
                    }
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn draw_text(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
) {
    let mut cursor_x = x;
    for ch in text.chars() {
        draw_glyph(buffer, width, height, cursor_x, y, ch, color);
        cursor_x += GLYPH_ADVANCE * TEXT_SCALE;
    }
}

fn draw_glyph(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    ch: char,
    color: [u8; 4],
) {
    let rows = glyph(ch.to_ascii_uppercase());
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..5 {
            if (bits >> (4 - col)) & 1 == 1 {
                for dy in 0..TEXT_SCALE {
                    for dx in 0..TEXT_SCALE {
                        put_pixel_safe(
                            buffer,
                            width,
                            height,
                            x + col * TEXT_SCALE + dx,
                            y + row as i32 * TEXT_SCALE + dy,
                            color,
                        );
                    }
                }
            }
        }
    }
}

/// 5x5 bitmap rows per character, MSB left. Unknown characters render blank.
fn glyph(ch: char) -> [u8; 5] {
    match ch {
        'A' => [0b01110, 0b10001, 0b11111, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b11110, 0b10001, 0b11110],
        'C' => [0b01111, 0b10000, 0b10000, 0b10000, 0b01111],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000],
        'G' => [0b01111, 0b10000, 0b10011, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b11111, 0b10001, 0b10001],
        'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b11111],
        'J' => [0b00111, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b11100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b11110, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        'Y' => [0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
        '0' => [0b01110, 0b10011, 0b10101, 0b11001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00110, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00110, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b11111, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b11110],
        '6' => [0b01110, 0b10000, 0b11110, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b00100],
        '8' => [0b01110, 0b10001, 0b01110, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b01111, 0b00001, 0b01110],
        ':' => [0b00000, 0b00100, 0b00000, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00100, 0b01000],
        '(' => [0b00010, 0b00100, 0b00100, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00100, 0b00100, 0b01000],
        '%' => [0b11001, 0b11010, 0b00100, 0b01011, 0b10011],
        '-' => [0b00000, 0b00000, 0b01110, 0b00000, 0b00000],
        '/' => [0b00001, 0b00010, 0b00100, 0b01000, 0b10000],
        _ => [0b00000; 5],
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExpressionScores, Gender};
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32) -> Frame {
        Frame {
            rgba: vec![40u8; (width * height * 4) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    fn face(bbox: [f32; 4]) -> FaceDetection {
        FaceDetection {
            bbox,
            landmarks: vec![(bbox[0] + 5.0, bbox[1] + 5.0)],
            expressions: ExpressionScores::new([0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1]),
            age: 30.0,
            gender: Gender::Female,
            gender_confidence: 0.91,
            score: 0.95,
        }
    }

    fn analysis(frame: &Frame, faces: Vec<FaceDetection>) -> AnalyzedFrame {
        AnalyzedFrame {
            faces,
            frame_width: frame.width,
            frame_height: frame.height,
        }
    }

    #[test]
    fn no_faces_leaves_the_frame_untouched() {
        let frame = solid_frame(64, 64);
        let surface = annotate_frame(&frame, Some(&analysis(&frame, Vec::new())));
        assert_eq!(surface, frame.rgba);
    }

    #[test]
    fn annotations_never_survive_into_the_next_tick() {
        let frame = solid_frame(64, 64);
        let with_face = annotate_frame(&frame, Some(&analysis(&frame, vec![face([10.0, 10.0, 40.0, 40.0])])));
        assert_ne!(with_face, frame.rgba);

        // A later tick with zero faces must render exactly the raw frame.
        let empty_again = annotate_frame(&frame, Some(&analysis(&frame, Vec::new())));
        assert_eq!(empty_again, frame.rgba);
    }

    #[test]
    fn drawing_a_face_changes_pixels_on_the_box_edge() {
        let frame = solid_frame(64, 64);
        let surface = annotate_frame(&frame, Some(&analysis(&frame, vec![face([10.0, 10.0, 40.0, 40.0])])));
        let idx = ((15 * 64 + 10) * 4) as usize; // on the left edge
        assert_eq!(&surface[idx..idx + 4], &BOX_COLOR);
    }

    #[test]
    fn coordinates_scale_from_source_to_display_space() {
        let mut surface = vec![0u8; 128 * 128 * 4];
        let mut f = face([10.0, 10.0, 30.0, 30.0]);
        f.landmarks = vec![(20.0, 20.0)];
        // Source is 64x64; display is 128x128, so everything doubles.
        draw_detections(
            &mut surface,
            DisplaySize {
                width: 128,
                height: 128,
            },
            (64, 64),
            &[f],
        );
        let idx = ((40 * 128 + 40) * 4) as usize; // landmark lands at (40, 40)
        assert_eq!(&surface[idx..idx + 4], &LANDMARK_COLOR);
    }

    #[test]
    fn out_of_bounds_faces_do_not_panic() {
        let frame = solid_frame(32, 32);
        let wild = face([-50.0, -50.0, 500.0, 500.0]);
        let _ = annotate_frame(&frame, Some(&analysis(&frame, vec![wild])));
    }

    #[test]
    fn zero_sized_source_is_a_no_op() {
        let mut surface = vec![7u8; 16 * 16 * 4];
        let before = surface.clone();
        draw_detections(
            &mut surface,
            DisplaySize {
                width: 16,
                height: 16,
            },
            (0, 0),
            &[face([1.0, 1.0, 5.0, 5.0])],
        );
        assert_eq!(surface, before);
    }
}
