// src/cube.rs
// Cube-face addressing as pure functions, independent of any graphics API's
// face-ordering tables. Face order follows cubemap array layers:
// +X, -X, +Y, -Y, +Z, -Z.

use glam::Vec3;

pub const CUBE_FACE_COUNT: u32 = 6;

/// Unit direction represented by normalized face coordinates `(u, v)` in
/// `[0, 1]^2`. `(0, 0)` is the top-left corner of the face.
pub fn face_direction(face: u32, u: f32, v: f32) -> Vec3 {
    let a = 2.0 * u - 1.0;
    let b = 2.0 * v - 1.0;
    match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    }
    .normalize()
}

/// Direction through the center of texel `(x, y)` on a `size`-wide face.
pub fn texel_direction(face: u32, x: u32, y: u32, size: u32) -> Vec3 {
    let u = (x as f32 + 0.5) / size as f32;
    let v = (y as f32 + 0.5) / size as f32;
    face_direction(face, u, v)
}

/// Inverse of [`face_direction`]: the face index and `(u, v)` coordinates a
/// direction projects onto. The direction need not be normalized.
pub fn direction_to_face_uv(dir: Vec3) -> (u32, f32, f32) {
    let ax = dir.x.abs();
    let ay = dir.y.abs();
    let az = dir.z.abs();

    let (face, a, b) = if ax >= ay && ax >= az {
        if dir.x > 0.0 {
            (0, -dir.z / ax, -dir.y / ax)
        } else {
            (1, dir.z / ax, -dir.y / ax)
        }
    } else if ay >= az {
        if dir.y > 0.0 {
            (2, dir.x / ay, dir.z / ay)
        } else {
            (3, dir.x / ay, -dir.z / ay)
        }
    } else if dir.z > 0.0 {
        (4, dir.x / az, -dir.y / az)
    } else {
        (5, -dir.x / az, -dir.y / az)
    };

    (face, (a + 1.0) * 0.5, (b + 1.0) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn face_centers_are_axes() {
        let expected = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (face, axis) in expected.iter().enumerate() {
            let d = face_direction(face as u32, 0.5, 0.5);
            assert!(
                (d - *axis).length() < EPS,
                "face {face} center {d:?} != {axis:?}"
            );
        }
    }

    #[test]
    fn directions_are_unit_length() {
        for face in 0..CUBE_FACE_COUNT {
            for y in 0..8 {
                for x in 0..8 {
                    let d = texel_direction(face, x, y, 8);
                    assert!((d.length() - 1.0).abs() < EPS);
                }
            }
        }
    }

    #[test]
    fn face_uv_round_trip() {
        let size = 16;
        for face in 0..CUBE_FACE_COUNT {
            for y in 0..size {
                for x in 0..size {
                    let d = texel_direction(face, x, y, size);
                    let (f, u, v) = direction_to_face_uv(d);
                    assert_eq!(f, face, "direction {d:?} landed on the wrong face");
                    let expect_u = (x as f32 + 0.5) / size as f32;
                    let expect_v = (y as f32 + 0.5) / size as f32;
                    assert!((u - expect_u).abs() < 1e-4);
                    assert!((v - expect_v).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn inverse_covers_all_faces() {
        let mut seen = [false; 6];
        for face in 0..CUBE_FACE_COUNT {
            let (f, _, _) = direction_to_face_uv(face_direction(face, 0.3, 0.7));
            seen[f as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
