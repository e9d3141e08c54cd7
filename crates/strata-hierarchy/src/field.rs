//! Tangent frames, symmetry compatibility operators, and random field
//! seeding.
//!
//! The compatibility operators answer one question: given the field values of
//! two vertices, which symmetry-equivalent representatives lie closest to
//! each other? Orientation fields live under a k-fold rotational symmetry
//! (k in {2, 4, 6}); position fields live on a lattice with 3- or 4-fold
//! positional symmetry.

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::f32::consts::PI;

/// Fixed seed for the random field initializers: the default stream
/// increment of the PCG32 generator family.
const FIELD_SEED: u64 = 0xda3e_39cb_94b9_5bdb;

const SQRT_3_OVER_2: f32 = 0.866_025_4;

/// Orientation-compatibility operator signature: two tangent directions and
/// their normals in, the closest symmetry-equivalent representatives out.
pub type CompatOrientation = fn(
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>);

/// Position-compatibility operator signature:
/// `(v0, n0, q0, o0, v1, n1, q1, o1, scale, inv_scale)` in, the closest
/// lattice-equivalent position representatives out.
pub type CompatPosition = fn(
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    &Vector3<f32>,
    f32,
    f32,
) -> (Vector3<f32>, Vector3<f32>);

/// Builds an orthonormal tangent frame `(s, t)` for the unit normal `n`.
pub fn coordinate_system(n: &Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let s = if n.x.abs() > n.y.abs() {
        let inv_len = 1.0 / (n.x * n.x + n.z * n.z).sqrt();
        Vector3::new(n.z * inv_len, 0.0, -n.x * inv_len)
    } else {
        let inv_len = 1.0 / (n.y * n.y + n.z * n.z).sqrt();
        Vector3::new(0.0, n.z * inv_len, -n.y * inv_len)
    };
    let t = n.cross(&s);
    (s, t)
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Rotates tangent direction `d` by 60 degrees around `n`.
fn rotate60(d: &Vector3<f32>, n: &Vector3<f32>) -> Vector3<f32> {
    d * 0.5 + n.cross(d) * SQRT_3_OVER_2
}

/// 2-fold (line field) compatibility: flip the second direction onto the
/// first's half-space.
pub fn compat_orientation_extrinsic_2(
    q0: &Vector3<f32>,
    _n0: &Vector3<f32>,
    q1: &Vector3<f32>,
    _n1: &Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    (*q0, *q1 * sign(q0.dot(q1)))
}

/// 4-fold (cross field) compatibility: pick the pair among each side's two
/// frame axes with the largest absolute alignment.
pub fn compat_orientation_extrinsic_4(
    q0: &Vector3<f32>,
    n0: &Vector3<f32>,
    q1: &Vector3<f32>,
    n1: &Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    let a = [*q0, n0.cross(q0)];
    let b = [*q1, n1.cross(q1)];

    let mut best = (0, 0, f32::NEG_INFINITY);
    for (i, ai) in a.iter().enumerate() {
        for (j, bj) in b.iter().enumerate() {
            let score = ai.dot(bj).abs();
            if score > best.2 {
                best = (i, j, score);
            }
        }
    }
    let dp = a[best.0].dot(&b[best.1]);
    (a[best.0], b[best.1] * sign(dp))
}

/// 6-fold compatibility: candidates are the direction and its rotations by
/// 60 and 120 degrees on each side.
pub fn compat_orientation_extrinsic_6(
    q0: &Vector3<f32>,
    n0: &Vector3<f32>,
    q1: &Vector3<f32>,
    n1: &Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    let r0 = rotate60(q0, n0);
    let r1 = rotate60(q1, n1);
    let a = [*q0, r0, rotate60(&r0, n0)];
    let b = [*q1, r1, rotate60(&r1, n1)];

    let mut best = (0, 0, f32::NEG_INFINITY);
    for (i, ai) in a.iter().enumerate() {
        for (j, bj) in b.iter().enumerate() {
            let score = ai.dot(bj).abs();
            if score > best.2 {
                best = (i, j, score);
            }
        }
    }
    let dp = a[best.0].dot(&b[best.1]);
    (a[best.0], b[best.1] * sign(dp))
}

/// Point on both tangent planes closest to the midpoint of `p0` and `p1`.
fn middle_point(
    p0: &Vector3<f32>,
    n0: &Vector3<f32>,
    p1: &Vector3<f32>,
    n1: &Vector3<f32>,
) -> Vector3<f32> {
    let n0p0 = n0.dot(p0);
    let n0p1 = n0.dot(p1);
    let n1p0 = n1.dot(p0);
    let n1p1 = n1.dot(p1);
    let n0n1 = n0.dot(n1);
    let denom = 1.0 / (1.0 - n0n1 * n0n1 + 1e-4);
    let lambda_0 = 2.0 * (n0p1 - n0p0 - n0n1 * (n1p0 - n1p1)) * denom;
    let lambda_1 = 2.0 * (n1p0 - n1p1 - n0n1 * (n0p1 - n0p0)) * denom;
    (p0 + p1) * 0.5 - (n0 * lambda_0 + n1 * lambda_1) * 0.25
}

/// Rounds `p` into the square lattice spanned by `(q, t)` around `o`.
fn position_round_4(
    o: &Vector3<f32>,
    q: &Vector3<f32>,
    t: &Vector3<f32>,
    p: &Vector3<f32>,
    scale: f32,
    inv_scale: f32,
) -> Vector3<f32> {
    let d = p - o;
    o + q * ((q.dot(&d) * inv_scale).round() * scale)
        + t * ((t.dot(&d) * inv_scale).round() * scale)
}

/// Rounds `p` into the triangular lattice spanned by `q` and its 60-degree
/// rotation around `o`, picking the closest of the four bracketing lattice
/// points.
fn position_round_3(
    o: &Vector3<f32>,
    q: &Vector3<f32>,
    t: &Vector3<f32>,
    p: &Vector3<f32>,
    scale: f32,
    inv_scale: f32,
) -> Vector3<f32> {
    let e0 = *q;
    let e1 = q * 0.5 + t * SQRT_3_OVER_2;
    let d = p - o;
    let d0 = d.dot(&e0) * inv_scale;
    let d1 = d.dot(&e1) * inv_scale;
    // Fractional lattice coordinates via the inverse Gram matrix of (e0, e1).
    let alpha = (4.0 * d0 - 2.0 * d1) / 3.0;
    let beta = (4.0 * d1 - 2.0 * d0) / 3.0;

    let mut best = *o;
    let mut best_d2 = f32::INFINITY;
    for da in [alpha.floor(), alpha.ceil()] {
        for db in [beta.floor(), beta.ceil()] {
            let candidate = o + (e0 * da + e1 * db) * scale;
            let d2 = (candidate - p).norm_squared();
            if d2 < best_d2 {
                best_d2 = d2;
                best = candidate;
            }
        }
    }
    best
}

/// 4-fold positional compatibility.
#[allow(clippy::too_many_arguments)]
pub fn compat_position_extrinsic_4(
    v0: &Vector3<f32>,
    n0: &Vector3<f32>,
    q0: &Vector3<f32>,
    o0: &Vector3<f32>,
    v1: &Vector3<f32>,
    n1: &Vector3<f32>,
    q1: &Vector3<f32>,
    o1: &Vector3<f32>,
    scale: f32,
    inv_scale: f32,
) -> (Vector3<f32>, Vector3<f32>) {
    let t0 = n0.cross(q0);
    let t1 = n1.cross(q1);
    let middle = middle_point(v0, n0, v1, n1);
    (
        position_round_4(o0, q0, &t0, &middle, scale, inv_scale),
        position_round_4(o1, q1, &t1, &middle, scale, inv_scale),
    )
}

/// 3-fold positional compatibility.
#[allow(clippy::too_many_arguments)]
pub fn compat_position_extrinsic_3(
    v0: &Vector3<f32>,
    n0: &Vector3<f32>,
    q0: &Vector3<f32>,
    o0: &Vector3<f32>,
    v1: &Vector3<f32>,
    n1: &Vector3<f32>,
    q1: &Vector3<f32>,
    o1: &Vector3<f32>,
    scale: f32,
    inv_scale: f32,
) -> (Vector3<f32>, Vector3<f32>) {
    let t0 = n0.cross(q0);
    let t1 = n1.cross(q1);
    let middle = middle_point(v0, n0, v1, n1);
    (
        position_round_3(o0, q0, &t0, &middle, scale, inv_scale),
        position_round_3(o1, q1, &t1, &middle, scale, inv_scale),
    )
}

/// Seeds a uniformly random unit tangent direction per vertex.
///
/// Each worker chunk re-seeds the stream and seeks it to the chunk start, so
/// the result depends only on the chunk size, never on thread scheduling.
pub fn init_random_tangent(normals: &[Vector3<f32>], grain_size: usize) -> Vec<Vector3<f32>> {
    let grain = grain_size.max(1);
    let mut field = vec![Vector3::zeros(); normals.len()];
    field
        .par_chunks_mut(grain)
        .enumerate()
        .for_each(|(chunk, out)| {
            let start = chunk * grain;
            let mut rng = ChaCha8Rng::seed_from_u64(FIELD_SEED);
            rng.set_word_pos(start as u128);
            for (k, value) in out.iter_mut().enumerate() {
                let (s, t) = coordinate_system(&normals[start + k]);
                let angle = rng.gen::<f32>() * 2.0 * PI;
                *value = s * angle.cos() + t * angle.sin();
            }
        });
    field
}

/// Seeds a random position-field sample per vertex, offset from the vertex
/// position inside a tangent square of half-extent `scale`.
pub fn init_random_position(
    positions: &[Vector3<f32>],
    normals: &[Vector3<f32>],
    scale: f32,
    grain_size: usize,
) -> Vec<Vector3<f32>> {
    let grain = grain_size.max(1);
    let mut field = vec![Vector3::zeros(); normals.len()];
    field
        .par_chunks_mut(grain)
        .enumerate()
        .for_each(|(chunk, out)| {
            let start = chunk * grain;
            let mut rng = ChaCha8Rng::seed_from_u64(FIELD_SEED);
            rng.set_word_pos(2 * start as u128);
            for (k, value) in out.iter_mut().enumerate() {
                let (s, t) = coordinate_system(&normals[start + k]);
                let x = rng.gen::<f32>() * 2.0 - 1.0;
                let y = rng.gen::<f32>() * 2.0 - 1.0;
                *value = positions[start + k] + (s * x + t * y) * scale;
            }
        });
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn unit(v: Vector3<f32>) -> Vector3<f32> {
        v.normalize()
    }

    #[test]
    fn test_coordinate_system_is_orthonormal() {
        for n in [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            unit(Vector3::new(0.3, -0.7, 0.2)),
        ] {
            let (s, t) = coordinate_system(&n);
            assert!((s.norm() - 1.0).abs() < EPS);
            assert!((t.norm() - 1.0).abs() < EPS);
            assert!(s.dot(&n).abs() < EPS);
            assert!(t.dot(&n).abs() < EPS);
            assert!(s.dot(&t).abs() < EPS);
        }
    }

    #[test]
    fn test_compat_2_flips_opposed_directions() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        let q0 = Vector3::new(1.0, 0.0, 0.0);
        let q1 = Vector3::new(-1.0, 0.0, 0.0);
        let (a, b) = compat_orientation_extrinsic_2(&q0, &n, &q1, &n);
        assert_eq!(a, q0);
        assert!((b - q0).norm() < EPS);
    }

    #[test]
    fn test_compat_4_aligns_perpendicular_crosses() {
        // A cross field is invariant under 90-degree rotation; the operator
        // must find representatives within 45 degrees of each other.
        let n = Vector3::new(0.0, 0.0, 1.0);
        let q0 = Vector3::new(1.0, 0.0, 0.0);
        let q1 = Vector3::new(0.0, 1.0, 0.0);
        let (a, b) = compat_orientation_extrinsic_4(&q0, &n, &q1, &n);
        assert!(a.dot(&b) > 1.0 - EPS);
    }

    #[test]
    fn test_compat_6_alignment_bound() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        let q0 = Vector3::new(1.0, 0.0, 0.0);
        // 80 degrees away; some 60-degree rotation lands within 30 degrees.
        let theta = 80.0f32.to_radians();
        let q1 = Vector3::new(theta.cos(), theta.sin(), 0.0);
        let (a, b) = compat_orientation_extrinsic_6(&q0, &n, &q1, &n);
        assert!(a.dot(&b) >= (30.0f32.to_radians()).cos() - EPS);
    }

    #[test]
    fn test_middle_point_on_shared_plane() {
        // Coplanar case: the middle point is the plain midpoint.
        let n = Vector3::new(0.0, 0.0, 1.0);
        let p0 = Vector3::new(0.0, 0.0, 0.0);
        let p1 = Vector3::new(2.0, 0.0, 0.0);
        let m = middle_point(&p0, &n, &p1, &n);
        assert!((m - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-3);
    }

    #[test]
    fn test_position_round_4_snaps_to_lattice() {
        let o = Vector3::new(0.0, 0.0, 0.0);
        let q = Vector3::new(1.0, 0.0, 0.0);
        let t = Vector3::new(0.0, 1.0, 0.0);
        let p = Vector3::new(1.9, -1.2, 0.0);
        let snapped = position_round_4(&o, &q, &t, &p, 1.0, 1.0);
        assert!((snapped - Vector3::new(2.0, -1.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn test_position_round_3_prefers_nearest_vertex() {
        let o = Vector3::new(0.0, 0.0, 0.0);
        let q = Vector3::new(1.0, 0.0, 0.0);
        let t = Vector3::new(0.0, 1.0, 0.0);
        // Slightly off a lattice point one step along e1.
        let e1 = q * 0.5 + t * SQRT_3_OVER_2;
        let p = e1 * 1.02;
        let snapped = position_round_3(&o, &q, &t, &p, 1.0, 1.0);
        assert!((snapped - e1).norm() < 1e-4);
    }

    #[test]
    fn test_init_random_tangent_is_unit_and_tangent() {
        let normals: Vec<Vector3<f32>> = (0..257)
            .map(|i| unit(Vector3::new((i as f32).sin(), (i as f32).cos(), 1.0)))
            .collect();
        let q = init_random_tangent(&normals, 64);
        for (qi, ni) in q.iter().zip(&normals) {
            assert!((qi.norm() - 1.0).abs() < 1e-4);
            assert!(qi.dot(ni).abs() < 1e-4);
        }
    }

    #[test]
    fn test_init_is_chunk_deterministic() {
        let normals = vec![Vector3::new(0.0, 0.0, 1.0); 100];
        let positions = vec![Vector3::zeros(); 100];
        let q0 = init_random_tangent(&normals, 16);
        let q1 = init_random_tangent(&normals, 16);
        assert_eq!(q0, q1);
        let o0 = init_random_position(&positions, &normals, 0.5, 16);
        let o1 = init_random_position(&positions, &normals, 0.5, 16);
        assert_eq!(o0, o1);
    }

    #[test]
    fn test_init_random_position_stays_in_tangent_square() {
        let normals = vec![Vector3::new(0.0, 0.0, 1.0); 32];
        let positions: Vec<Vector3<f32>> =
            (0..32).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect();
        let scale = 0.25;
        let o = init_random_position(&positions, &normals, scale, 8);
        for (oi, pi) in o.iter().zip(&positions) {
            let d = oi - pi;
            assert!(d.z.abs() < EPS);
            assert!(d.x.abs() <= 2.0 * scale + EPS);
            assert!(d.y.abs() <= 2.0 * scale + EPS);
        }
    }
}
