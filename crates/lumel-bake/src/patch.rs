//! Biquadratic patch resampling: subdivision, curve snapping, degenerate
//! row/column removal, and grid evaluation for sample-point placement.

use lumel_geom::Vec3;

use crate::constants::{COLINEAR_EPSILON, MAX_PATCH_ITERATIONS, WRAP_EPSILON};

#[derive(Clone, Copy, Debug, Default)]
pub struct PatchVert {
    pub pos: Vec3,
    pub normal: Vec3,
}

/// A patch control grid, refined in place into a dense on-curve mesh.
#[derive(Clone, Debug)]
pub struct PatchMesh {
    pub width: usize,
    pub height: usize,
    pub verts: Vec<PatchVert>,
}

impl PatchMesh {
    pub fn from_points(width: usize, height: usize, points: &[Vec3]) -> Self {
        let verts = points
            .iter()
            .map(|&pos| PatchVert {
                pos,
                normal: Vec3::ZERO,
            })
            .collect();
        Self {
            width,
            height,
            verts,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> Vec3 {
        self.verts[y * self.width + x].pos
    }

    /// Longest distance between adjacent control points, either direction.
    pub fn longest_control_edge(&self) -> f32 {
        let mut longest = 0.0f32;
        for y in 0..self.height {
            for x in 0..self.width {
                if x + 1 < self.width {
                    longest = longest.max(self.at(x, y).distance(self.at(x + 1, y)));
                }
                if y + 1 < self.height {
                    longest = longest.max(self.at(x, y).distance(self.at(x, y + 1)));
                }
            }
        }
        longest
    }

    /// Subdivision rounds needed to bring the longest edge under `target`.
    pub fn iterations_for(longest_edge: f32, target: f32) -> usize {
        let mut len = target.max(1.0);
        let mut rounds = 0;
        while len < longest_edge && rounds < MAX_PATCH_ITERATIONS {
            len *= 2.0;
            rounds += 1;
        }
        rounds
    }

    /// Whether the first/last column (s) or row (t) coincide in world space,
    /// so the lightmap must wrap for seam continuity.
    pub fn wraps(&self) -> [bool; 2] {
        let mut wrap = [true, true];
        for y in 0..self.height {
            if self.at(0, y).distance(self.at(self.width - 1, y)) > WRAP_EPSILON {
                wrap[0] = false;
                break;
            }
        }
        for x in 0..self.width {
            if self.at(x, 0).distance(self.at(x, self.height - 1)) > WRAP_EPSILON {
                wrap[1] = false;
                break;
            }
        }
        wrap
    }

    /// One subdivision round along the width axis: every quadratic segment
    /// pair `c0,c1,c2` becomes `c0, (c0+c1)/2, (c0+2c1+c2)/4, (c1+c2)/2, c2`.
    fn expand_columns(&self) -> PatchMesh {
        let nw = self.width * 2 - 1;
        let mut verts = Vec::with_capacity(nw * self.height);
        for y in 0..self.height {
            for seg in (0..self.width - 2).step_by(2) {
                let c0 = self.at(seg, y);
                let c1 = self.at(seg + 1, y);
                let c2 = self.at(seg + 2, y);
                verts.push(PatchVert { pos: c0, normal: Vec3::ZERO });
                verts.push(PatchVert { pos: (c0 + c1) * 0.5, normal: Vec3::ZERO });
                verts.push(PatchVert {
                    pos: (c0 + c1 * 2.0 + c2) * 0.25,
                    normal: Vec3::ZERO,
                });
                verts.push(PatchVert { pos: (c1 + c2) * 0.5, normal: Vec3::ZERO });
            }
            verts.push(PatchVert {
                pos: self.at(self.width - 1, y),
                normal: Vec3::ZERO,
            });
        }
        PatchMesh {
            width: nw,
            height: self.height,
            verts,
        }
    }

    fn transposed(&self) -> PatchMesh {
        let mut verts = Vec::with_capacity(self.verts.len());
        for x in 0..self.width {
            for y in 0..self.height {
                verts.push(self.verts[y * self.width + x]);
            }
        }
        PatchMesh {
            width: self.height,
            height: self.width,
            verts,
        }
    }

    /// Snaps off-curve control points onto the surface so the grid can be
    /// treated linearly from here on.
    fn put_on_curve(&mut self) {
        for y in 0..self.height {
            for x in (1..self.width - 1).step_by(2) {
                let p = (self.at(x - 1, y) + self.at(x, y) * 2.0 + self.at(x + 1, y)) * 0.25;
                self.verts[y * self.width + x].pos = p;
            }
        }
        for x in 0..self.width {
            for y in (1..self.height - 1).step_by(2) {
                let p = (self.at(x, y - 1) + self.at(x, y) * 2.0 + self.at(x, y + 1)) * 0.25;
                self.verts[y * self.width + x].pos = p;
            }
        }
    }

    /// Drops interior rows/columns that sit on the line between their
    /// neighbors; subdivision manufactures plenty of these on flat spans.
    fn remove_linear(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            if self.width > 3 {
                for x in (1..self.width - 1).rev() {
                    let colinear = (0..self.height).all(|y| {
                        let mid = (self.at(x - 1, y) + self.at(x + 1, y)) * 0.5;
                        self.at(x, y).distance(mid) <= COLINEAR_EPSILON
                    });
                    if colinear {
                        self.drop_column(x);
                        changed = true;
                        break;
                    }
                }
            }
            if self.height > 3 {
                for y in (1..self.height - 1).rev() {
                    let colinear = (0..self.width).all(|x| {
                        let mid = (self.at(x, y - 1) + self.at(x, y + 1)) * 0.5;
                        self.at(x, y).distance(mid) <= COLINEAR_EPSILON
                    });
                    if colinear {
                        self.drop_row(y);
                        changed = true;
                        break;
                    }
                }
            }
        }
    }

    fn drop_column(&mut self, col: usize) {
        let mut verts = Vec::with_capacity((self.width - 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if x != col {
                    verts.push(self.verts[y * self.width + x]);
                }
            }
        }
        self.width -= 1;
        self.verts = verts;
    }

    fn drop_row(&mut self, row: usize) {
        let mut verts = Vec::with_capacity(self.width * (self.height - 1));
        for y in 0..self.height {
            if y != row {
                verts.extend_from_slice(&self.verts[y * self.width..(y + 1) * self.width]);
            }
        }
        self.height -= 1;
        self.verts = verts;
    }

    fn compute_normals(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let du = self.at((x + 1).min(self.width - 1), y) - self.at(x.saturating_sub(1), y);
                let dv = self.at(x, (y + 1).min(self.height - 1)) - self.at(x, y.saturating_sub(1));
                let mut n = du.cross(dv);
                if n.length() <= f32::EPSILON {
                    n = Vec3::new(0.0, 0.0, 1.0);
                }
                self.verts[y * self.width + x].normal = n.normalized();
            }
        }
    }

    /// Produces the refined on-curve mesh used for texel placement.
    pub fn refined(&self, iterations: usize) -> PatchMesh {
        let mut mesh = self.clone();
        for _ in 0..iterations {
            mesh = mesh.expand_columns();
            mesh = mesh.transposed().expand_columns().transposed();
        }
        mesh.put_on_curve();
        mesh.remove_linear();
        mesh.compute_normals();
        mesh
    }

    /// Longest accumulated row length (along width) and column length
    /// (along height), for deriving the lightmap dimensions.
    pub fn span_lengths(&self) -> (f32, f32) {
        let mut row_max = 0.0f32;
        for y in 0..self.height {
            let mut len = 0.0;
            for x in 0..self.width - 1 {
                len += self.at(x, y).distance(self.at(x + 1, y));
            }
            row_max = row_max.max(len);
        }
        let mut col_max = 0.0f32;
        for x in 0..self.width {
            let mut len = 0.0;
            for y in 0..self.height - 1 {
                len += self.at(x, y).distance(self.at(x, y + 1));
            }
            col_max = col_max.max(len);
        }
        (row_max, col_max)
    }

    /// Bilinear position + normal at fractional parameters in `[0,1]`.
    pub fn eval(&self, u: f32, v: f32) -> (Vec3, Vec3) {
        let fx = (u.clamp(0.0, 1.0)) * (self.width - 1) as f32;
        let fy = (v.clamp(0.0, 1.0)) * (self.height - 1) as f32;
        let ix = (fx.floor() as usize).min(self.width.saturating_sub(2));
        let iy = (fy.floor() as usize).min(self.height.saturating_sub(2));
        let tx = fx - ix as f32;
        let ty = fy - iy as f32;
        let x1 = (ix + 1).min(self.width - 1);
        let y1 = (iy + 1).min(self.height - 1);
        let lerp = |a: Vec3, b: Vec3, t: f32| a + (b - a) * t;
        let v00 = self.verts[iy * self.width + ix];
        let v10 = self.verts[iy * self.width + x1];
        let v01 = self.verts[y1 * self.width + ix];
        let v11 = self.verts[y1 * self.width + x1];
        let pos = lerp(lerp(v00.pos, v10.pos, tx), lerp(v01.pos, v11.pos, tx), ty);
        let normal = lerp(
            lerp(v00.normal, v10.normal, tx),
            lerp(v01.normal, v11.normal, tx),
            ty,
        )
        .normalized();
        (pos, normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(w: usize, h: usize, step: f32) -> PatchMesh {
        let mut pts = Vec::new();
        for y in 0..h {
            for x in 0..w {
                pts.push(Vec3::new(x as f32 * step, y as f32 * step, 0.0));
            }
        }
        PatchMesh::from_points(w, h, &pts)
    }

    #[test]
    fn refining_a_flat_patch_collapses_back() {
        let mesh = flat_grid(3, 3, 32.0);
        let refined = mesh.refined(2);
        // Everything interior is colinear on a flat grid, so removal pulls
        // the refined mesh back down to its corners.
        assert!(refined.width <= 3);
        assert!(refined.height <= 3);
        let (pos, normal) = refined.eval(0.5, 0.5);
        assert!((pos.x - 32.0).abs() < 1e-3);
        assert!((pos.y - 32.0).abs() < 1e-3);
        assert!((normal.z.abs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn curved_patch_keeps_refinement() {
        // A half-cylinder-ish bump: center column lifted.
        let mut mesh = flat_grid(3, 3, 32.0);
        for y in 0..3 {
            mesh.verts[y * 3 + 1].pos.z = 48.0;
        }
        let refined = mesh.refined(2);
        assert!(refined.width > 3);
        let (top, _) = refined.eval(0.5, 0.5);
        // On-curve midpoint of a quadratic with control z=48 is z=24.
        assert!((top.z - 24.0).abs() < 1.0);
    }

    #[test]
    fn iteration_count_scales_with_edge_length() {
        assert_eq!(PatchMesh::iterations_for(4.0, 8.0), 0);
        assert_eq!(PatchMesh::iterations_for(100.0, 8.0), 4);
        assert!(PatchMesh::iterations_for(1e9, 8.0) <= MAX_PATCH_ITERATIONS);
    }

    #[test]
    fn closed_cylinder_wraps_in_s() {
        // First and last columns coincide.
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(32.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 32.0),
            Vec3::new(32.0, 0.0, 32.0),
            Vec3::new(0.0, 0.0, 32.0),
            Vec3::new(0.0, 0.0, 64.0),
            Vec3::new(32.0, 0.0, 64.0),
            Vec3::new(0.0, 0.0, 64.0),
        ];
        let mesh = PatchMesh::from_points(3, 3, &pts);
        assert_eq!(mesh.wraps(), [true, false]);
    }
}
