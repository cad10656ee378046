use glam::Vec2;
use smallvec::SmallVec;

use crate::body::{Body, BodyHandle};
use crate::math::{self, LENGTH_EPSILON};
use crate::shape::Shape;

/// Tolerance when classifying a vertex as on a clip edge.
const EDGE_TOLERANCE: f32 = 1e-4;

/// Result of narrow phase for one candidate pair: the collision normal
/// pointing from `a` toward `b`, the penetration depth, and a single
/// world-space contact point.
#[derive(Debug, Clone, Copy)]
pub struct Manifold {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub normal: Vec2,
    pub penetration: f32,
    pub contact_point: Vec2,
}

#[derive(Clone, Copy)]
struct Hit {
    normal: Vec2,
    penetration: f32,
    point: Vec2,
}

/// Test a candidate pair. Touching counts as contact with zero penetration.
pub fn collide(a: &Body, b: &Body) -> Option<Manifold> {
    let hit = collide_shapes(&a.shape, a.center, a.angle, &b.shape, b.center, b.angle)?;
    Some(Manifold {
        a: a.handle,
        b: b.handle,
        normal: hit.normal,
        penetration: hit.penetration,
        contact_point: hit.point,
    })
}

/// Shape-level dispatch. Compounds test each child in its composed pose and
/// keep the deepest child manifold.
fn collide_shapes(
    sa: &Shape,
    ca: Vec2,
    aa: f32,
    sb: &Shape,
    cb: Vec2,
    ab: f32,
) -> Option<Hit> {
    match (sa, sb) {
        (Shape::Compound { children }, _) => {
            let mut best: Option<Hit> = None;
            for child in children {
                let child_center = ca + math::rotate(child.offset, aa);
                let hit =
                    collide_shapes(&child.shape, child_center, aa + child.angle, sb, cb, ab);
                if let Some(hit) = hit {
                    if best.map_or(true, |b| hit.penetration > b.penetration) {
                        best = Some(hit);
                    }
                }
            }
            best
        }
        (_, Shape::Compound { children }) => {
            let mut best: Option<Hit> = None;
            for child in children {
                let child_center = cb + math::rotate(child.offset, ab);
                let hit =
                    collide_shapes(sa, ca, aa, &child.shape, child_center, ab + child.angle);
                if let Some(hit) = hit {
                    if best.map_or(true, |b| hit.penetration > b.penetration) {
                        best = Some(hit);
                    }
                }
            }
            best
        }
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(ca, *ra, cb, *rb)
        }
        // Canonicalize so the polygon side is always the subroutine's A.
        (Shape::Circle { radius }, _) => {
            let verts = sb.transformed_vertices(cb, ab);
            let hit = polygon_circle(&verts, ca, *radius)?;
            Some(Hit { normal: -hit.normal, ..hit })
        }
        (_, Shape::Circle { radius }) => {
            let verts = sa.transformed_vertices(ca, aa);
            polygon_circle(&verts, cb, *radius)
        }
        _ => {
            let verts_a = sa.transformed_vertices(ca, aa);
            let verts_b = sb.transformed_vertices(cb, ab);
            polygon_polygon(&verts_a, ca, &verts_b, cb)
        }
    }
}

fn circle_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<Hit> {
    let delta = cb - ca;
    let radii = ra + rb;
    let dist_sq = delta.length_squared();
    if dist_sq > radii * radii {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = math::normalize_or(delta, Vec2::X);
    Some(Hit {
        normal,
        penetration: radii - dist,
        point: ca + normal * ra,
    })
}

/// Polygon (A, world vertices) against circle (B). The normal points from
/// the polygon toward the circle.
fn polygon_circle(verts: &[Vec2], circle_center: Vec2, radius: f32) -> Option<Hit> {
    if verts.len() < 3 {
        return None;
    }
    let n = verts.len();
    let mut best_dist_sq = f32::MAX;
    let mut best_point = verts[0];
    let mut best_edge = 0;
    for i in 0..n {
        let p = closest_point_on_segment(circle_center, verts[i], verts[(i + 1) % n]);
        let d2 = (circle_center - p).length_squared();
        if d2 < best_dist_sq {
            best_dist_sq = d2;
            best_point = p;
            best_edge = i;
        }
    }

    let inside = point_in_polygon(circle_center, verts);
    let dist = best_dist_sq.sqrt();
    if !inside && dist > radius {
        return None;
    }

    let (normal, penetration) = if inside || dist <= LENGTH_EPSILON {
        // Center on or behind the boundary: use the closest edge's outward
        // normal and push the circle out through it.
        let edge = verts[(best_edge + 1) % n] - verts[best_edge];
        let outward = math::normalize_or(Vec2::new(edge.y, -edge.x), Vec2::X);
        let penetration = if inside { radius + dist } else { radius - dist };
        (outward, penetration)
    } else {
        ((circle_center - best_point) / dist, radius - dist)
    };

    Some(Hit {
        normal,
        penetration,
        point: best_point,
    })
}

fn polygon_polygon(verts_a: &[Vec2], ca: Vec2, verts_b: &[Vec2], cb: Vec2) -> Option<Hit> {
    if verts_a.len() < 3 || verts_b.len() < 3 {
        return None;
    }

    // SAT over both edge-normal sets; the axis of minimum overlap is the
    // manifold normal.
    let mut min_overlap = f32::MAX;
    let mut min_axis = Vec2::X;
    for verts in [verts_a, verts_b] {
        let n = verts.len();
        for i in 0..n {
            let edge = verts[(i + 1) % n] - verts[i];
            let len = edge.length();
            if len < LENGTH_EPSILON {
                continue;
            }
            let axis = Vec2::new(edge.y, -edge.x) / len;
            let (min_a, max_a) = project(verts_a, axis);
            let (min_b, max_b) = project(verts_b, axis);
            let overlap = max_a.min(max_b) - min_a.max(min_b);
            if overlap < 0.0 {
                return None;
            }
            if overlap < min_overlap {
                min_overlap = overlap;
                min_axis = axis;
            }
        }
    }

    let mut normal = min_axis;
    if (cb - ca).dot(normal) < 0.0 {
        normal = -normal;
    }

    // Contact region: Sutherland-Hodgman clip of A's loop against B's loop;
    // the contact point is the clip polygon's area-weighted centroid. An
    // empty clip falls back to the midpoint of the two centers.
    let clipped = clip_polygons(verts_a, verts_b);
    let point = if clipped.is_empty() {
        (ca + cb) * 0.5
    } else {
        math::polygon_centroid(&clipped)
    };

    Some(Hit {
        normal,
        penetration: min_overlap,
        point,
    })
}

/// Sutherland-Hodgman clipping of `subject` against convex `clip` (both
/// counter-clockwise). Returns the intersection polygon; vertices within
/// the edge tolerance are kept, so clipping a polygon against itself
/// returns it unchanged.
pub fn clip_polygons(subject: &[Vec2], clip: &[Vec2]) -> Vec<Vec2> {
    let mut output: SmallVec<[Vec2; 8]> = SmallVec::from_slice(subject);
    let n = clip.len();
    for i in 0..n {
        if output.is_empty() {
            break;
        }
        let e0 = clip[i];
        let edge = clip[(i + 1) % n] - e0;
        let input: SmallVec<[Vec2; 8]> = std::mem::take(&mut output);
        let m = input.len();
        for j in 0..m {
            let current = input[j];
            let next = input[(j + 1) % m];
            let d_current = edge.perp_dot(current - e0);
            let d_next = edge.perp_dot(next - e0);
            let inside_current = d_current >= -EDGE_TOLERANCE;
            let inside_next = d_next >= -EDGE_TOLERANCE;
            if inside_current {
                output.push(current);
            }
            if inside_current != inside_next {
                let t = d_current / (d_current - d_next);
                output.push(current + (next - current) * t);
            }
        }
    }
    output.into_vec()
}

fn project(verts: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &v in verts {
        let p = v.dot(axis);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let ab_sq = ab.length_squared();
    if ab_sq < LENGTH_EPSILON * LENGTH_EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / ab_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Convex containment: inside when the point is on the interior side of
/// every counter-clockwise edge.
fn point_in_polygon(p: Vec2, verts: &[Vec2]) -> bool {
    let n = verts.len();
    for i in 0..n {
        let edge = verts[(i + 1) % n] - verts[i];
        if edge.perp_dot(p - verts[i]) < -EDGE_TOLERANCE {
            return false;
        }
    }
    true
}
