use glam::Vec2;

use crate::error::Error;
use crate::math::{self, Aabb, LENGTH_EPSILON};

/// Tolerance when classifying a vertex against an edge during validation
/// and containment tests.
const EDGE_TOLERANCE: f32 = 1e-4;

/// One child of a compound shape, posed relative to the compound origin.
///
/// A zero mass defaults to the child shape's area, mirroring the body-level
/// rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundChild {
    pub shape: Shape,
    pub offset: Vec2,
    pub angle: f32,
    pub mass: f32,
}

/// Convex collision shape variants.
///
/// Polygons store local-space vertices wound counter-clockwise; input in
/// either winding is canonicalized by [`Shape::polygon`]. Compounds aggregate
/// convex children and must not nest.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    Box { width: f32, height: f32 },
    Polygon { vertices: Vec<Vec2> },
    Compound { children: Vec<CompoundChild> },
}

impl Shape {
    pub fn circle(radius: f32) -> Result<Self, Error> {
        if radius <= 0.0 {
            return Err(Error::InvalidShape("circle radius must be positive"));
        }
        Ok(Shape::Circle { radius })
    }

    pub fn rect(width: f32, height: f32) -> Result<Self, Error> {
        if width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidShape("box dimensions must be positive"));
        }
        Ok(Shape::Box { width, height })
    }

    /// Build a convex polygon from local-space vertices in either winding.
    pub fn polygon(mut vertices: Vec<Vec2>) -> Result<Self, Error> {
        if vertices.len() < 3 {
            return Err(Error::InvalidShape("polygon needs at least three vertices"));
        }
        let area = math::polygon_area(&vertices);
        if area.abs() < LENGTH_EPSILON {
            return Err(Error::InvalidShape("polygon area is degenerate"));
        }
        if area < 0.0 {
            vertices.reverse();
        }
        let n = vertices.len();
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            let next = vertices[(i + 2) % n] - vertices[(i + 1) % n];
            if edge.perp_dot(next) < -EDGE_TOLERANCE {
                return Err(Error::InvalidShape("polygon must be convex"));
            }
        }
        Ok(Shape::Polygon { vertices })
    }

    /// Build a compound from posed children. Children are re-validated
    /// through their own constructors; nesting compounds is rejected.
    pub fn compound(children: Vec<CompoundChild>) -> Result<Self, Error> {
        if children.is_empty() {
            return Err(Error::InvalidShape("compound needs at least one child"));
        }
        let mut validated = Vec::with_capacity(children.len());
        for child in children {
            let shape = match child.shape {
                Shape::Circle { radius } => Shape::circle(radius)?,
                Shape::Box { width, height } => Shape::rect(width, height)?,
                Shape::Polygon { vertices } => Shape::polygon(vertices)?,
                Shape::Compound { .. } => {
                    return Err(Error::InvalidShape("compound shapes must not nest"));
                }
            };
            if child.mass < 0.0 {
                return Err(Error::InvalidMass(child.mass));
            }
            let mass = if child.mass == 0.0 { shape.area() } else { child.mass };
            validated.push(CompoundChild {
                shape,
                offset: child.offset,
                angle: child.angle,
                mass,
            });
        }
        Ok(Shape::Compound { children: validated })
    }

    /// World-space bounding box of the shape posed at `center`/`angle`.
    pub fn aabb(&self, center: Vec2, angle: f32) -> Aabb {
        match self {
            Shape::Circle { radius } => {
                Aabb::from_center_half_extents(center, Vec2::splat(*radius))
            }
            Shape::Box { width, height } => {
                let (sin, cos) = angle.sin_cos();
                let half = Vec2::new(
                    (width * cos.abs() + height * sin.abs()) * 0.5,
                    (width * sin.abs() + height * cos.abs()) * 0.5,
                );
                Aabb::from_center_half_extents(center, half)
            }
            Shape::Polygon { .. } => {
                let verts = self.transformed_vertices(center, angle);
                let mut min = verts[0];
                let mut max = verts[0];
                for &v in &verts[1..] {
                    min = min.min(v);
                    max = max.max(v);
                }
                Aabb { min, max }
            }
            Shape::Compound { children } => {
                let mut bounds: Option<Aabb> = None;
                for child in children {
                    let child_aabb = child
                        .shape
                        .aabb(center + math::rotate(child.offset, angle), angle + child.angle);
                    bounds = Some(match bounds {
                        Some(b) => b.union(&child_aabb),
                        None => child_aabb,
                    });
                }
                bounds.unwrap_or(Aabb { min: center, max: center })
            }
        }
    }

    pub fn area(&self) -> f32 {
        match self {
            Shape::Circle { radius } => std::f32::consts::PI * radius * radius,
            Shape::Box { width, height } => width * height,
            Shape::Polygon { vertices } => math::polygon_area(vertices),
            Shape::Compound { children } => children.iter().map(|c| c.shape.area()).sum(),
        }
    }

    /// Moment of inertia about the shape origin for the given mass.
    ///
    /// Compounds ignore `mass` and sum their children by the parallel-axis
    /// theorem, each child contributing its own inertia plus `m * d^2`.
    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match self {
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
            Shape::Box { width, height } => mass * (width * width + height * height) / 12.0,
            Shape::Polygon { vertices } => polygon_inertia(vertices, mass),
            Shape::Compound { children } => children
                .iter()
                .map(|c| c.shape.moment_of_inertia(c.mass) + c.mass * c.offset.length_squared())
                .sum(),
        }
    }

    pub fn contains(&self, point: Vec2, center: Vec2, angle: f32) -> bool {
        match self {
            Shape::Circle { radius } => (point - center).length_squared() <= radius * radius,
            Shape::Box { width, height } => {
                let local = math::rotate(point - center, -angle);
                local.x.abs() <= width * 0.5 + EDGE_TOLERANCE
                    && local.y.abs() <= height * 0.5 + EDGE_TOLERANCE
            }
            Shape::Polygon { vertices } => {
                let local = math::rotate(point - center, -angle);
                let n = vertices.len();
                for i in 0..n {
                    let edge = vertices[(i + 1) % n] - vertices[i];
                    if edge.perp_dot(local - vertices[i]) < -EDGE_TOLERANCE {
                        return false;
                    }
                }
                true
            }
            Shape::Compound { children } => children.iter().any(|c| {
                c.shape
                    .contains(point, center + math::rotate(c.offset, angle), angle + c.angle)
            }),
        }
    }

    /// World-space vertices of the shape posed at `center`/`angle`. Circles
    /// have none; compounds concatenate children in declaration order.
    pub fn transformed_vertices(&self, center: Vec2, angle: f32) -> Vec<Vec2> {
        match self {
            Shape::Circle { .. } => Vec::new(),
            Shape::Box { width, height } => {
                let hw = width * 0.5;
                let hh = height * 0.5;
                [
                    Vec2::new(-hw, -hh),
                    Vec2::new(hw, -hh),
                    Vec2::new(hw, hh),
                    Vec2::new(-hw, hh),
                ]
                .iter()
                .map(|&v| center + math::rotate(v, angle))
                .collect()
            }
            Shape::Polygon { vertices } => vertices
                .iter()
                .map(|&v| center + math::rotate(v, angle))
                .collect(),
            Shape::Compound { children } => children
                .iter()
                .flat_map(|c| {
                    c.shape.transformed_vertices(
                        center + math::rotate(c.offset, angle),
                        angle + c.angle,
                    )
                })
                .collect(),
        }
    }

    /// Diagnostic horizontal extent of the unrotated shape.
    pub fn width(&self) -> f32 {
        self.aabb(Vec2::ZERO, 0.0).width()
    }

    /// Diagnostic vertical extent of the unrotated shape.
    pub fn height(&self) -> f32 {
        self.aabb(Vec2::ZERO, 0.0).height()
    }
}

/// Area-weighted polygon inertia about the local origin.
fn polygon_inertia(vertices: &[Vec2], mass: f32) -> f32 {
    let n = vertices.len();
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.perp_dot(b).abs();
        numerator += cross * (a.length_squared() + a.dot(b) + b.length_squared());
        denominator += cross;
    }
    if denominator < LENGTH_EPSILON {
        return 0.0;
    }
    mass * numerator / (6.0 * denominator)
}
