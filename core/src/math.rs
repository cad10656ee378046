use glam::Vec2;

/// Lengths below this are treated as zero when normalizing or dividing.
pub const LENGTH_EPSILON: f32 = 1e-6;

/// Rotate `v` by `angle` radians, counter-clockwise positive.
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Normalize `v`, falling back to `fallback` when the length is degenerate.
pub fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let len = v.length();
    if len > LENGTH_EPSILON { v / len } else { fallback }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    angle
}

/// Signed area of a polygon (positive when wound counter-clockwise).
pub fn polygon_area(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    let mut sum = 0.0;
    for i in 0..n {
        sum += vertices[i].perp_dot(vertices[(i + 1) % n]);
    }
    sum * 0.5
}

/// Area-weighted centroid of a polygon. Degenerate (near-zero area) inputs
/// fall back to the vertex mean.
pub fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    let n = vertices.len();
    if n == 0 {
        return Vec2::ZERO;
    }
    let area = polygon_area(vertices);
    if n < 3 || area.abs() < LENGTH_EPSILON {
        return vertices.iter().copied().sum::<Vec2>() / n as f32;
    }
    let mut centroid = Vec2::ZERO;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        centroid += (a + b) * a.perp_dot(b);
    }
    centroid / (6.0 * area)
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    /// Build from two corners given in any order.
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    pub fn from_center_half_extents(center: Vec2, half: Vec2) -> Self {
        Self { min: center - half, max: center + half }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}
