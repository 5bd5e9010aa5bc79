//! Minimal geometry types for the baking crates (no renderer dependency).
#![forbid(unsafe_code)]

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }

    #[inline]
    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn cross(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(self, rhs: Vec3) -> f32 {
        (self - rhs).length()
    }

    #[inline]
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 { self / len } else { self }
    }

    #[inline]
    pub fn get(self, axis: usize) -> f32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[inline]
    pub fn set(&mut self, axis: usize, v: f32) {
        match axis {
            0 => self.x = v,
            1 => self.y = v,
            _ => self.z = v,
        }
    }

    #[inline]
    pub fn min(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    #[inline]
    pub fn max(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    /// Index `[0..3)` of the component with the largest magnitude.
    /// Ties are broken toward Z, then Y, so axis picks stay stable.
    #[inline]
    pub fn dominant_axis(self) -> usize {
        let ax = self.x.abs();
        let ay = self.y.abs();
        let az = self.z.abs();
        if az >= ax && az >= ay {
            2
        } else if ay >= ax {
            1
        } else {
            0
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Vec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    #[inline]
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `add_point` call will snap onto.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    #[inline]
    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn union(self, rhs: Aabb) -> Aabb {
        Aabb::new(self.min.min(rhs.min), self.max.max(rhs.max))
    }

    #[inline]
    pub fn size(self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn expanded(self, amount: f32) -> Aabb {
        Aabb::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    #[inline]
    pub fn overlaps(self, rhs: Aabb) -> bool {
        self.min.x <= rhs.max.x
            && self.max.x >= rhs.min.x
            && self.min.y <= rhs.max.y
            && self.max.y >= rhs.min.y
            && self.min.z <= rhs.max.z
            && self.max.z >= rhs.min.z
    }

    #[inline]
    pub fn contains(self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

/// Plane in `normal . p = dist` form, normal unit-length by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    #[inline]
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Builds a plane through `p` with the given (not necessarily unit) normal.
    /// Returns `None` when the normal has zero magnitude.
    pub fn from_point_normal(p: Vec3, normal: Vec3) -> Option<Self> {
        let len = normal.length();
        if len <= f32::EPSILON {
            return None;
        }
        let n = normal / len;
        Some(Self {
            normal: n,
            dist: n.dot(p),
        })
    }

    /// Builds a plane from three points, `None` for degenerate triangles.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        Self::from_point_normal(a, (b - a).cross(c - a))
    }

    #[inline]
    pub fn distance_to(self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.dist
    }

    /// Equality within `normal_eps` on the normal and `dist_eps` on the distance.
    #[inline]
    pub fn nearly_equal(self, rhs: Plane, normal_eps: f32, dist_eps: f32) -> bool {
        (self.normal.x - rhs.normal.x).abs() <= normal_eps
            && (self.normal.y - rhs.normal.y).abs() <= normal_eps
            && (self.normal.z - rhs.normal.z).abs() <= normal_eps
            && (self.dist - rhs.dist).abs() <= dist_eps
    }

    /// Solves `normal . p = dist` for the `axis` component of `p`, holding the
    /// other two fixed. `None` when the normal is perpendicular to that axis.
    pub fn solve_axis(self, p: Vec3, axis: usize) -> Option<f32> {
        let na = self.normal.get(axis);
        if na.abs() <= f32::EPSILON {
            return None;
        }
        let mut rest = 0.0;
        for i in 0..3 {
            if i != axis {
                rest += self.normal.get(i) * p.get(i);
            }
        }
        Some((self.dist - rest) / na)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dominant_axis_prefers_z_on_ties() {
        assert_eq!(Vec3::new(1.0, 0.0, 1.0).dominant_axis(), 2);
        assert_eq!(Vec3::new(1.0, 1.0, 0.0).dominant_axis(), 1);
        assert_eq!(Vec3::new(1.0, 1.0, 1.0).dominant_axis(), 2);
        assert_eq!(Vec3::new(-3.0, 1.0, 2.0).dominant_axis(), 0);
    }

    #[test]
    fn plane_solve_axis_recovers_point() {
        let p = Plane::from_points(
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(1.0, 0.0, 4.5),
            Vec3::new(0.0, 1.0, 4.25),
        )
        .unwrap();
        let q = Vec3::new(2.0, 3.0, 0.0);
        let z = p.solve_axis(q, 2).unwrap();
        let on_plane = Vec3::new(q.x, q.y, z);
        assert!(p.distance_to(on_plane).abs() < 1e-4);
    }

    fn finite_vec3() -> impl Strategy<Value = Vec3> {
        (-1e6f32..1e6, -1e6f32..1e6, -1e6f32..1e6).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn aabb_union_contains_both(
            (a0, a1) in (finite_vec3(), finite_vec3()),
            (b0, b1) in (finite_vec3(), finite_vec3()),
        ) {
            let a = Aabb::new(a0.min(a1), a0.max(a1));
            let b = Aabb::new(b0.min(b1), b0.max(b1));
            let u = a.union(b);
            prop_assert!(u.min.x <= a.min.x.min(b.min.x));
            prop_assert!(u.max.x >= a.max.x.max(b.max.x));
            prop_assert!(u.overlaps(a) && u.overlaps(b));
        }

        #[test]
        fn add_point_makes_contained(p in finite_vec3()) {
            let mut b = Aabb::empty();
            b.add_point(p);
            prop_assert!(b.contains(p));
        }
    }
}
