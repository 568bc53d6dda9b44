//! Tray icon artwork.
//!
//! The icon is drawn as RGBA pixels: a microphone on a blue disc with a
//! level gauge beside it.

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

const DISC: (u8, u8, u8) = (40, 110, 200);
const GLYPH: (u8, u8, u8) = (255, 255, 255);
const GAUGE: (u8, u8, u8) = (120, 220, 120);

/// Generate the tray icon as RGBA data, `ICON_SIZE` pixels square.
pub fn generate_icon_rgba() -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];

    draw_disc(&mut rgba, size);
    draw_microphone(&mut rgba, size);
    draw_gauge(&mut rgba, size);

    rgba
}

/// Build the tray icon.
#[cfg(windows)]
pub fn create_tray_icon() -> Result<tray_icon::Icon, String> {
    tray_icon::Icon::from_rgba(generate_icon_rgba(), ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

fn put(rgba: &mut [u8], size: usize, x: usize, y: usize, (r, g, b): (u8, u8, u8), alpha: u8) {
    if x >= size || y >= size {
        return;
    }
    let idx = (y * size + x) * 4;
    rgba[idx] = r;
    rgba[idx + 1] = g;
    rgba[idx + 2] = b;
    rgba[idx + 3] = alpha;
}

/// Only paint over pixels the disc already covers.
fn paint_inside(rgba: &mut [u8], size: usize, x: usize, y: usize, color: (u8, u8, u8)) {
    if x < size && y < size && rgba[(y * size + x) * 4 + 3] > 0 {
        put(rgba, size, x, y, color, 255);
    }
}

fn draw_disc(rgba: &mut [u8], size: usize) {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 2.0 - 1.5;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist < radius {
                put(rgba, size, x, y, DISC, 255);
            } else if dist < radius + 1.0 {
                // anti-aliased edge
                let alpha = ((radius + 1.0 - dist) * 255.0) as u8;
                put(rgba, size, x, y, DISC, alpha);
            }
        }
    }
}

fn draw_microphone(rgba: &mut [u8], size: usize) {
    let center_x = size * 2 / 5;

    // capsule
    let half_width = size / 10;
    let top = size / 5;
    let bottom = size * 3 / 5;
    for y in top..bottom {
        for x in (center_x - half_width)..=(center_x + half_width) {
            paint_inside(rgba, size, x, y, GLYPH);
        }
    }

    // stand
    for y in bottom..(bottom + size / 8) {
        paint_inside(rgba, size, center_x, y, GLYPH);
    }

    // base
    let base_y = bottom + size / 8;
    for x in (center_x - half_width)..=(center_x + half_width) {
        paint_inside(rgba, size, x, base_y, GLYPH);
    }
}

fn draw_gauge(rgba: &mut [u8], size: usize) {
    let left = size * 3 / 5;
    let bottom = size * 3 / 4;
    let bar_width = 2;
    let gap = 1;

    for bar in 0..3 {
        let height = size / 8 * (bar + 1);
        let x0 = left + bar * (bar_width + gap);
        for y in (bottom - height)..bottom {
            for x in x0..(x0 + bar_width) {
                paint_inside(rgba, size, x, y, GAUGE);
            }
        }
    }
}
