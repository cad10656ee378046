//! Integration tests for the math, shape, broad-phase and narrow-phase
//! layers.

use ballast_core::broadphase::SpatialHash;
use ballast_core::error::Error;
use ballast_core::math::{self, Aabb};
use ballast_core::narrowphase::{self, clip_polygons};
use ballast_core::shape::{CompoundChild, Shape};
use ballast_core::world::{World, WorldConfig};
use glam::Vec2;

fn v(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y)
}

fn quiet_world() -> World {
    World::new(WorldConfig {
        gravity: Vec2::ZERO,
        ..WorldConfig::default()
    })
}

fn square(half: f32) -> Vec<Vec2> {
    vec![v(-half, -half), v(half, -half), v(half, half), v(-half, half)]
}

// =========================================================================
// Math
// =========================================================================

#[test]
fn test_wrap_angle_stays_in_half_open_range() {
    use std::f32::consts::PI;
    assert!((math::wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
    assert!((math::wrap_angle(-PI) - PI).abs() < 1e-5);
    assert!((math::wrap_angle(0.25) - 0.25).abs() < 1e-6);
    assert!((math::wrap_angle(-2.0 * PI)).abs() < 1e-5);
}

#[test]
fn test_rotate_quarter_turn() {
    let r = math::rotate(v(1.0, 0.0), std::f32::consts::FRAC_PI_2);
    assert!((r.x).abs() < 1e-6);
    assert!((r.y - 1.0).abs() < 1e-6);
}

#[test]
fn test_polygon_centroid_recentering_yields_zero() {
    let triangle = vec![v(0.0, 0.0), v(4.0, 0.0), v(0.0, 3.0)];
    let centroid = math::polygon_centroid(&triangle);
    assert!((centroid.x - 4.0 / 3.0).abs() < 1e-5);
    assert!((centroid.y - 1.0).abs() < 1e-5);

    let recentered: Vec<Vec2> = triangle.iter().map(|&p| p - centroid).collect();
    let again = math::polygon_centroid(&recentered);
    assert!(again.length() < 1e-5);
}

#[test]
fn test_aabb_canonicalizes_inverted_corners() {
    let aabb = Aabb::new(v(5.0, 7.0), v(-1.0, 2.0));
    assert!(aabb.min.x <= aabb.max.x && aabb.min.y <= aabb.max.y);
    assert_eq!(aabb.min, v(-1.0, 2.0));
    assert_eq!(aabb.max, v(5.0, 7.0));
}

#[test]
fn test_aabb_overlap_and_containment() {
    let a = Aabb::new(v(0.0, 0.0), v(10.0, 10.0));
    let b = Aabb::new(v(9.0, 9.0), v(20.0, 20.0));
    let c = Aabb::new(v(11.0, 0.0), v(20.0, 5.0));
    assert!(a.overlaps(&b));
    assert!(!a.overlaps(&c));
    assert!(a.contains_point(v(5.0, 5.0)));
    assert!(!a.contains_point(v(10.5, 5.0)));
}

// =========================================================================
// Shapes
// =========================================================================

#[test]
fn test_shape_aabb_min_below_max_at_any_angle() {
    let shapes = [
        Shape::circle(3.0).unwrap(),
        Shape::rect(4.0, 2.0).unwrap(),
        Shape::polygon(vec![v(-2.0, -1.0), v(3.0, -1.0), v(0.0, 2.0)]).unwrap(),
    ];
    for shape in &shapes {
        for &angle in &[0.0, 0.3, 1.2, std::f32::consts::FRAC_PI_2, 2.7, -1.1] {
            let aabb = shape.aabb(v(7.0, -4.0), angle);
            assert!(aabb.min.x <= aabb.max.x);
            assert!(aabb.min.y <= aabb.max.y);
        }
    }
}

#[test]
fn test_circle_aabb_rotation_invariant() {
    let shape = Shape::circle(5.0).unwrap();
    let reference = shape.aabb(v(10.0, 20.0), 0.0);
    for &angle in &[0.5, 1.7, 3.0, -2.2] {
        let aabb = shape.aabb(v(10.0, 20.0), angle);
        assert!((aabb.min - reference.min).length() < 1e-5);
        assert!((aabb.max - reference.max).length() < 1e-5);
    }
}

#[test]
fn test_box_aabb_quarter_turn_swaps_extents() {
    let shape = Shape::rect(4.0, 2.0).unwrap();
    let flat = shape.aabb(Vec2::ZERO, 0.0);
    assert!((flat.width() - 4.0).abs() < 1e-5);
    assert!((flat.height() - 2.0).abs() < 1e-5);

    let turned = shape.aabb(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
    assert!((turned.width() - 2.0).abs() < 1e-5);
    assert!((turned.height() - 4.0).abs() < 1e-5);
}

#[test]
fn test_polygon_contains_own_vertices() {
    let shape = Shape::polygon(square(1.0)).unwrap();
    let center = v(5.0, 5.0);
    let angle = 0.7;
    for world in shape.transformed_vertices(center, angle) {
        assert!(shape.contains(world, center, angle));
    }
}

#[test]
fn test_clockwise_input_is_canonicalized() {
    let mut cw = square(1.0);
    cw.reverse();
    let shape = Shape::polygon(cw).unwrap();
    assert!((shape.area() - 4.0).abs() < 1e-5);
    assert!(shape.contains(Vec2::ZERO, Vec2::ZERO, 0.0));
}

#[test]
fn test_invalid_shapes_rejected() {
    assert_eq!(
        Shape::circle(0.0),
        Err(Error::InvalidShape("circle radius must be positive"))
    );
    assert!(Shape::rect(0.0, 5.0).is_err());
    assert!(Shape::polygon(vec![v(0.0, 0.0), v(1.0, 0.0)]).is_err());

    // Chevron: concave at the notch.
    let chevron = vec![v(0.0, 0.0), v(2.0, 2.0), v(4.0, 0.0), v(2.0, 1.0)];
    assert!(Shape::polygon(chevron).is_err());

    let inner = Shape::compound(vec![CompoundChild {
        shape: Shape::circle(1.0).unwrap(),
        offset: Vec2::ZERO,
        angle: 0.0,
        mass: 1.0,
    }])
    .unwrap();
    let nested = Shape::compound(vec![CompoundChild {
        shape: inner,
        offset: Vec2::ZERO,
        angle: 0.0,
        mass: 1.0,
    }]);
    assert_eq!(nested, Err(Error::InvalidShape("compound shapes must not nest")));
}

#[test]
fn test_circle_inertia() {
    let shape = Shape::circle(2.0).unwrap();
    // I = 0.5 * m * r^2 = 0.5 * 4 * 4 = 8
    assert!((shape.moment_of_inertia(4.0) - 8.0).abs() < 1e-5);
}

#[test]
fn test_box_inertia() {
    let shape = Shape::rect(6.0, 4.0).unwrap();
    // I = m * (w^2 + h^2) / 12 = 12 * 52 / 12 = 52
    assert!((shape.moment_of_inertia(12.0) - 52.0).abs() < 1e-4);
}

#[test]
fn test_square_polygon_inertia_matches_box() {
    let polygon = Shape::polygon(square(3.0)).unwrap();
    let rect = Shape::rect(6.0, 6.0).unwrap();
    let mass = 5.0;
    assert!((polygon.moment_of_inertia(mass) - rect.moment_of_inertia(mass)).abs() < 1e-3);
}

#[test]
fn test_compound_inertia_uses_parallel_axis() {
    let shape = Shape::compound(vec![
        CompoundChild {
            shape: Shape::circle(1.0).unwrap(),
            offset: v(2.0, 0.0),
            angle: 0.0,
            mass: 1.0,
        },
        CompoundChild {
            shape: Shape::circle(1.0).unwrap(),
            offset: v(-2.0, 0.0),
            angle: 0.0,
            mass: 1.0,
        },
    ])
    .unwrap();
    // Each child: 0.5 * 1 * 1 + 1 * 4 = 4.5
    assert!((shape.moment_of_inertia(0.0) - 9.0).abs() < 1e-4);
    assert!((shape.area() - 2.0 * std::f32::consts::PI).abs() < 1e-4);
}

#[test]
fn test_compound_child_zero_mass_defaults_to_area() {
    let shape = Shape::compound(vec![CompoundChild {
        shape: Shape::circle(1.0).unwrap(),
        offset: Vec2::ZERO,
        angle: 0.0,
        mass: 0.0,
    }])
    .unwrap();
    let Shape::Compound { children } = &shape else {
        panic!("expected compound");
    };
    assert!((children[0].mass - std::f32::consts::PI).abs() < 1e-4);
}

#[test]
fn test_compound_containment_is_union_of_children() {
    let shape = Shape::compound(vec![
        CompoundChild {
            shape: Shape::rect(2.0, 2.0).unwrap(),
            offset: v(3.0, 0.0),
            angle: 0.0,
            mass: 1.0,
        },
        CompoundChild {
            shape: Shape::rect(2.0, 2.0).unwrap(),
            offset: v(-3.0, 0.0),
            angle: 0.0,
            mass: 1.0,
        },
    ])
    .unwrap();
    assert!(shape.contains(v(3.0, 0.5), Vec2::ZERO, 0.0));
    assert!(shape.contains(v(-3.0, -0.5), Vec2::ZERO, 0.0));
    // The gap between the children is outside.
    assert!(!shape.contains(Vec2::ZERO, Vec2::ZERO, 0.0));
    // Vertices concatenate in child declaration order.
    assert_eq!(shape.transformed_vertices(Vec2::ZERO, 0.0).len(), 8);
}

#[test]
fn test_shape_diagnostic_extents() {
    assert!((Shape::circle(3.0).unwrap().width() - 6.0).abs() < 1e-5);
    let rect = Shape::rect(4.0, 2.0).unwrap();
    assert!((rect.width() - 4.0).abs() < 1e-5);
    assert!((rect.height() - 2.0).abs() < 1e-5);
}

// =========================================================================
// Broad phase
// =========================================================================

#[test]
fn test_nearby_bodies_produce_pairs() {
    let mut world = quiet_world();
    let a = world.create_circle(Vec2::ZERO, 1.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(5.0, 5.0), 1.0, 0.0, false, 1.0).unwrap();

    let mut hash = SpatialHash::new(64.0);
    hash.insert(a, &Aabb::new(v(0.0, 0.0), v(10.0, 10.0)));
    hash.insert(b, &Aabb::new(v(5.0, 5.0), v(15.0, 15.0)));
    let pairs = hash.pairs();
    assert_eq!(pairs.len(), 1);
}

#[test]
fn test_far_apart_bodies_no_pairs() {
    let mut world = quiet_world();
    let a = world.create_circle(Vec2::ZERO, 1.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(500.0, 500.0), 1.0, 0.0, false, 1.0).unwrap();

    let mut hash = SpatialHash::new(64.0);
    hash.insert(a, &Aabb::new(v(0.0, 0.0), v(10.0, 10.0)));
    hash.insert(b, &Aabb::new(v(500.0, 500.0), v(510.0, 510.0)));
    assert!(hash.pairs().is_empty());
}

#[test]
fn test_broadphase_no_duplicate_pairs() {
    let mut world = quiet_world();
    let a = world.create_circle(Vec2::ZERO, 1.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(10.0, 10.0), 1.0, 0.0, false, 1.0).unwrap();

    let mut hash = SpatialHash::new(32.0);
    // Both AABBs span several cells; the pair must still be unique.
    hash.insert(a, &Aabb::new(v(0.0, 0.0), v(50.0, 50.0)));
    hash.insert(b, &Aabb::new(v(10.0, 10.0), v(60.0, 60.0)));
    assert_eq!(hash.pairs().len(), 1);
}

#[test]
fn test_broadphase_clear() {
    let mut world = quiet_world();
    let a = world.create_circle(Vec2::ZERO, 1.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(1.0, 0.0), 1.0, 0.0, false, 1.0).unwrap();

    let mut hash = SpatialHash::new(64.0);
    hash.insert(a, &Aabb::new(v(0.0, 0.0), v(10.0, 10.0)));
    hash.clear();
    hash.insert(b, &Aabb::new(v(0.0, 0.0), v(10.0, 10.0)));
    assert!(hash.pairs().is_empty());
}

// =========================================================================
// Narrow phase
// =========================================================================

#[test]
fn test_circle_circle_overlap() {
    let mut world = quiet_world();
    let a = world.create_circle(v(0.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(8.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();

    let manifold =
        narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).unwrap();
    assert!((manifold.penetration - 2.0).abs() < 1e-4);
    assert!((manifold.normal - v(1.0, 0.0)).length() < 1e-5);
    // Contact sits on A's surface along the normal.
    assert!((manifold.contact_point - v(5.0, 0.0)).length() < 1e-4);
}

#[test]
fn test_circle_circle_no_overlap() {
    let mut world = quiet_world();
    let a = world.create_circle(v(0.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(20.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();
    assert!(narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).is_none());
}

#[test]
fn test_circle_circle_exact_touch_reports_zero_penetration() {
    let mut world = quiet_world();
    let a = world.create_circle(v(0.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(10.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();

    let manifold =
        narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).unwrap();
    assert!(manifold.penetration.abs() < 1e-5);
}

#[test]
fn test_concentric_circles_use_fallback_normal() {
    let mut world = quiet_world();
    let a = world.create_circle(v(0.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();
    let b = world.create_circle(v(0.0, 0.0), 5.0, 0.0, false, 1.0).unwrap();

    let manifold =
        narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).unwrap();
    assert!((manifold.normal - v(1.0, 0.0)).length() < 1e-6);
    assert!((manifold.penetration - 10.0).abs() < 1e-4);
}

#[test]
fn test_circle_vs_box_canonicalizes_polygon_first() {
    let mut world = quiet_world();
    let circle = world.create_circle(v(2.0, 0.0), 2.0, 0.0, false, 1.0).unwrap();
    let boxed = world
        .create_box(v(3.0, -5.0), v(13.0, 5.0), 0.0, false, 1.0)
        .unwrap();

    let manifold =
        narrowphase::collide(world.get(circle).unwrap(), world.get(boxed).unwrap()).unwrap();
    // Normal points from the circle (A) toward the box (B).
    assert!((manifold.normal - v(1.0, 0.0)).length() < 1e-4);
    assert!((manifold.penetration - 1.0).abs() < 1e-4);
    assert!((manifold.contact_point - v(3.0, 0.0)).length() < 1e-4);
}

#[test]
fn test_circle_center_inside_polygon_pushes_through_closest_edge() {
    let mut world = quiet_world();
    let boxed = world
        .create_box(v(3.0, -5.0), v(13.0, 5.0), 0.0, false, 1.0)
        .unwrap();
    let circle = world.create_circle(v(7.5, 0.0), 2.0, 0.0, false, 1.0).unwrap();

    let manifold =
        narrowphase::collide(world.get(boxed).unwrap(), world.get(circle).unwrap()).unwrap();
    // Closest edge is the left face; penetration is radius plus the
    // center's distance to the boundary.
    assert!((manifold.normal - v(-1.0, 0.0)).length() < 1e-4);
    assert!((manifold.penetration - 6.5).abs() < 1e-3);
}

#[test]
fn test_overlapping_boxes_sat_manifold() {
    let mut world = quiet_world();
    let a = world
        .create_box(v(0.0, 0.0), v(10.0, 10.0), 0.0, false, 1.0)
        .unwrap();
    let b = world
        .create_box(v(5.0, 5.0), v(15.0, 15.0), 0.0, false, 1.0)
        .unwrap();

    let manifold =
        narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).unwrap();
    assert!((manifold.penetration - 5.0).abs() < 1e-4);
    // Minimum overlap ties on both axes; the normal must be axis-aligned
    // and point from A toward B.
    let n = manifold.normal;
    assert!((n.length() - 1.0).abs() < 1e-4);
    assert!(n.x.abs() < 1e-4 || n.y.abs() < 1e-4);
    assert!(n.dot(v(1.0, 1.0)) > 0.0);
    // Contact point is the clip region centroid.
    assert!((manifold.contact_point - v(7.5, 7.5)).length() < 1e-3);
}

#[test]
fn test_vertex_vertex_contact_reports_shared_corner() {
    let mut world = quiet_world();
    let a = world
        .create_box(v(0.0, 0.0), v(10.0, 10.0), 0.0, false, 1.0)
        .unwrap();
    let b = world
        .create_box(v(9.9, 9.9), v(19.9, 19.9), 0.0, false, 1.0)
        .unwrap();

    let manifold =
        narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).unwrap();
    assert!((manifold.penetration - 0.1).abs() < 1e-3);
    assert!((manifold.contact_point - v(9.95, 9.95)).length() < 0.05);
}

#[test]
fn test_separated_boxes_have_no_manifold() {
    let mut world = quiet_world();
    let a = world
        .create_box(v(0.0, 0.0), v(10.0, 10.0), 0.0, false, 1.0)
        .unwrap();
    let b = world
        .create_box(v(11.0, 0.0), v(21.0, 10.0), 0.0, false, 1.0)
        .unwrap();
    assert!(narrowphase::collide(world.get(a).unwrap(), world.get(b).unwrap()).is_none());
}

#[test]
fn test_compound_collides_through_deepest_child() {
    let mut world = quiet_world();
    let compound = world
        .create_compound(
            Vec2::ZERO,
            vec![
                CompoundChild {
                    shape: Shape::rect(2.0, 2.0).unwrap(),
                    offset: v(3.0, 0.0),
                    angle: 0.0,
                    mass: 1.0,
                },
                CompoundChild {
                    shape: Shape::rect(2.0, 2.0).unwrap(),
                    offset: v(-3.0, 0.0),
                    angle: 0.0,
                    mass: 1.0,
                },
            ],
            0.0,
            false,
        )
        .unwrap();
    let circle = world.create_circle(v(3.0, 1.5), 1.0, 0.0, false, 1.0).unwrap();

    let manifold =
        narrowphase::collide(world.get(compound).unwrap(), world.get(circle).unwrap()).unwrap();
    // The right child's top face is the contact; penetration = 1 - 0.5.
    assert!((manifold.penetration - 0.5).abs() < 1e-4);

    // A circle over the gap between children touches nothing.
    let miss = world.create_circle(v(0.0, 1.5), 0.4, 0.0, false, 1.0).unwrap();
    assert!(
        narrowphase::collide(world.get(compound).unwrap(), world.get(miss).unwrap()).is_none()
    );
}

// =========================================================================
// Sutherland-Hodgman clipping
// =========================================================================

#[test]
fn test_clip_polygon_against_itself_is_identity() {
    let subject: Vec<Vec2> = square(5.0).iter().map(|&p| p + v(3.0, 4.0)).collect();
    let clipped = clip_polygons(&subject, &subject);
    assert_eq!(clipped.len(), subject.len());
    for original in &subject {
        assert!(
            clipped.iter().any(|c| (*c - *original).length() < 1e-3),
            "missing vertex {original:?}"
        );
    }
}

#[test]
fn test_clip_overlapping_squares_yields_intersection() {
    let a: Vec<Vec2> = square(5.0).iter().map(|&p| p + v(5.0, 5.0)).collect();
    let b: Vec<Vec2> = square(5.0).iter().map(|&p| p + v(10.0, 10.0)).collect();
    let clipped = clip_polygons(&a, &b);
    assert!(!clipped.is_empty());
    let centroid = math::polygon_centroid(&clipped);
    assert!((centroid - v(7.5, 7.5)).length() < 1e-3);
    assert!((math::polygon_area(&clipped).abs() - 25.0).abs() < 1e-2);
}

#[test]
fn test_clip_disjoint_squares_is_empty() {
    let a = square(1.0);
    let b: Vec<Vec2> = square(1.0).iter().map(|&p| p + v(10.0, 0.0)).collect();
    assert!(clip_polygons(&a, &b).is_empty());
}
