//! Frame compositing — the three alignment warps applied as sequential
//! full-canvas resampling passes.

use crate::transform::AlignTransform;
use image::{Rgb, RgbImage};

/// 2×3 forward affine matrix, row-major:
/// `dst = [[m0, m1], [m3, m4]] * src + [m2, m5]`.
pub type AffineMatrix = [f32; 6];

/// Rotation-and-scale matrix about a pivot, in the OpenCV
/// `getRotationMatrix2D` convention: positive angles rotate
/// counter-clockwise and the pivot maps onto itself.
pub fn rotation_matrix(pivot: (f32, f32), angle_degrees: f32, scale: f32) -> AffineMatrix {
    let (cx, cy) = pivot;
    let radians = angle_degrees.to_radians();
    let alpha = scale * radians.cos();
    let beta = scale * radians.sin();

    [
        alpha,
        beta,
        (1.0 - alpha) * cx - beta * cy,
        -beta,
        alpha,
        beta * cx + (1.0 - alpha) * cy,
    ]
}

/// Pure-translation matrix.
pub fn translation_matrix(offset: (f32, f32)) -> AffineMatrix {
    [1.0, 0.0, offset.0, 0.0, 1.0, offset.1]
}

/// Apply a forward affine matrix to a point.
pub fn apply_to_point(m: &AffineMatrix, p: (f32, f32)) -> (f32, f32) {
    (
        m[0] * p.0 + m[1] * p.1 + m[2],
        m[3] * p.0 + m[4] * p.1 + m[5],
    )
}

/// Warp an RGB image through a forward affine matrix onto a canvas of the
/// same resolution.
///
/// Each output pixel is mapped back through the inverted matrix and sampled
/// with bilinear interpolation. Out-of-bounds samples are black. A singular
/// matrix produces an all-black canvas.
pub fn warp_affine(image: &RgbImage, matrix: &AffineMatrix) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut output = RgbImage::new(width, height);

    // Invert the 2x2 part: src = A^-1 * (dst - t)
    let det = matrix[0] * matrix[4] - matrix[1] * matrix[3];
    if det.abs() < 1e-12 {
        return output;
    }
    let inv = [
        matrix[4] / det,
        -matrix[1] / det,
        -matrix[3] / det,
        matrix[0] / det,
    ];

    let sample = |x: i32, y: i32| -> [f32; 3] {
        if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
            let p = image.get_pixel(x as u32, y as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0, 0.0, 0.0]
        }
    };

    for oy in 0..height {
        for ox in 0..width {
            let dx = ox as f32 - matrix[2];
            let dy = oy as f32 - matrix[5];
            let sx = inv[0] * dx + inv[1] * dy;
            let sy = inv[2] * dx + inv[3] * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let tl = sample(x0, y0);
            let tr = sample(x0 + 1, y0);
            let bl = sample(x0, y0 + 1);
            let br = sample(x0 + 1, y0 + 1);

            let mut pixel = [0u8; 3];
            for c in 0..3 {
                let value = tl[c] * (1.0 - fx) * (1.0 - fy)
                    + tr[c] * fx * (1.0 - fy)
                    + bl[c] * (1.0 - fx) * fy
                    + br[c] * fx * fy;
                pixel[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            output.put_pixel(ox, oy, Rgb(pixel));
        }
    }

    output
}

/// Align one frame: shrink about the detected left eye, translate the left
/// eye onto the anchor position, then rotate about the anchor position to
/// level the eye line.
///
/// The three warps run as separate resampling passes rather than one
/// composed matrix; composing them would resample once and shift the
/// numeric output slightly.
pub fn align_frame(image: &RgbImage, transform: &AlignTransform) -> RgbImage {
    let pivot = (transform.pivot.x, transform.pivot.y);
    let shrunk = warp_affine(image, &rotation_matrix(pivot, 0.0, transform.scale));

    let shifted = warp_affine(&shrunk, &translation_matrix(transform.translation));

    let anchor_pivot = (
        transform.pivot.x + transform.translation.0,
        transform.pivot.y + transform.translation.1,
    );
    warp_affine(
        &shifted,
        &rotation_matrix(anchor_pivot, transform.rotation_degrees, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::PixelPoint;
    use crate::transform::{build_transform, leveling_angle};
    use crate::anchor::ReferenceAnchor;

    fn gray_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([40, 40, 40]))
    }

    /// Paint a bright 5x5 patch centered at (x, y) so it survives bilinear
    /// interpolation through the warps.
    fn paint_patch(image: &mut RgbImage, x: u32, y: u32) {
        for dy in 0..5u32 {
            for dx in 0..5u32 {
                let px = x + dx - 2;
                let py = y + dy - 2;
                if px < image.width() && py < image.height() {
                    image.put_pixel(px, py, Rgb([255, 255, 255]));
                }
            }
        }
    }

    fn brightest_near(image: &RgbImage, x: u32, y: u32, radius: u32) -> u8 {
        let mut max = 0u8;
        for dy in 0..=2 * radius {
            for dx in 0..=2 * radius {
                let px = x + dx - radius;
                let py = y + dy - radius;
                if px < image.width() && py < image.height() {
                    max = max.max(image.get_pixel(px, py)[0]);
                }
            }
        }
        max
    }

    #[test]
    fn test_rotation_matrix_zero_angle_unit_scale_is_identity() {
        let m = rotation_matrix((123.0, 77.0), 0.0, 1.0);
        let p = apply_to_point(&m, (10.0, 20.0));
        assert!((p.0 - 10.0).abs() < 1e-4);
        assert!((p.1 - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_matrix_fixes_pivot() {
        let m = rotation_matrix((50.0, 80.0), 33.0, 0.7);
        let p = apply_to_point(&m, (50.0, 80.0));
        assert!((p.0 - 50.0).abs() < 1e-3);
        assert!((p.1 - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_rotation_levels_the_eye_line() {
        // Right eye 20 px lower over a 100 px baseline; after rotating by
        // the leveling angle about the left eye both eyes share a row.
        let left = PixelPoint::new(100.0, 100.0);
        let right = PixelPoint::new(200.0, 120.0);
        let angle = leveling_angle(&left, &right);

        let m = rotation_matrix((left.x, left.y), angle, 1.0);
        let (_, right_y) = apply_to_point(&m, (right.x, right.y));
        assert!((right_y - left.y).abs() < 0.5, "right eye y = {right_y}");
    }

    #[test]
    fn test_translation_matrix_shifts_points() {
        let m = translation_matrix((-15.0, 25.0));
        let p = apply_to_point(&m, (100.0, 100.0));
        assert!((p.0 - 85.0).abs() < 1e-4);
        assert!((p.1 - 125.0).abs() < 1e-4);
    }

    #[test]
    fn test_identity_warp_preserves_pixels() {
        let mut frame = gray_frame(64, 48);
        paint_patch(&mut frame, 30, 20);
        let out = warp_affine(&frame, &translation_matrix((0.0, 0.0)));
        assert_eq!(out, frame);
    }

    #[test]
    fn test_warp_translation_moves_patch() {
        let mut frame = gray_frame(100, 100);
        paint_patch(&mut frame, 40, 40);

        let out = warp_affine(&frame, &translation_matrix((20.0, -10.0)));
        assert_eq!(brightest_near(&out, 60, 30, 1), 255);
        assert!(brightest_near(&out, 40, 40, 1) < 255);
    }

    #[test]
    fn test_shrink_keeps_pivot_fixed() {
        let mut frame = gray_frame(100, 100);
        paint_patch(&mut frame, 50, 50);

        let out = warp_affine(&frame, &rotation_matrix((50.0, 50.0), 0.0, 0.5));
        assert_eq!(brightest_near(&out, 50, 50, 1), 255);
    }

    #[test]
    fn test_singular_matrix_yields_black_canvas() {
        let frame = gray_frame(32, 32);
        let out = warp_affine(&frame, &[0.0, 0.0, 5.0, 0.0, 0.0, 5.0]);
        assert!(out.pixels().all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
    }

    #[test]
    fn test_align_frame_moves_left_eye_onto_anchor() {
        // Eye distance 100 vs anchor 50: the frame is shrunk by 0.5 about
        // the left eye, shifted onto the anchor, and (here) not rotated.
        let left = PixelPoint::new(120.0, 90.0);
        let right = PixelPoint::new(220.0, 90.0);
        let face = crate::landmarks::FaceCandidate {
            nose: PixelPoint::new(170.0, 120.0),
            left_eye: left,
            right_eye: right,
        };
        let anchor = ReferenceAnchor {
            min_eye_distance: 50.0,
            left_eye: PixelPoint::new(100.0, 100.0),
        };

        let transform = build_transform(&face, &anchor).unwrap();
        assert!((transform.scale - 0.5).abs() < 1e-6);

        let mut frame = gray_frame(240, 180);
        paint_patch(&mut frame, 120, 90);

        let aligned = align_frame(&frame, &transform);
        assert_eq!(aligned.dimensions(), (240, 180));
        assert!(
            brightest_near(&aligned, 100, 100, 1) > 200,
            "left-eye patch should land on the anchor position"
        );
    }

    #[test]
    fn test_align_frame_with_tilt_still_lands_on_anchor() {
        let left = PixelPoint::new(110.0, 80.0);
        let right = PixelPoint::new(190.0, 100.0);
        let face = crate::landmarks::FaceCandidate {
            nose: PixelPoint::new(150.0, 120.0),
            left_eye: left,
            right_eye: right,
        };
        let anchor = ReferenceAnchor {
            min_eye_distance: 60.0,
            left_eye: PixelPoint::new(120.0, 110.0),
        };

        let transform = build_transform(&face, &anchor).unwrap();
        let mut frame = gray_frame(240, 200);
        paint_patch(&mut frame, 110, 80);

        let aligned = align_frame(&frame, &transform);
        // The rotation pivots on the anchor position, so the left eye stays put.
        assert!(brightest_near(&aligned, 120, 110, 2) > 180);
    }
}
