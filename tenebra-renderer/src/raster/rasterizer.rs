//! Triangle setup: clipping, perspective divide, viewport mapping and coverage.
//!
//! Positions are snapped to a 1/256 pixel grid in viewport-local coordinates and edge functions
//! are evaluated in integers with a top-left fill rule, so pixels on edges shared by two
//! triangles are covered exactly once.

use std::ops::{Add, Mul};

use glam::{Vec2, Vec3, Vec4};

use crate::{PipelineState, Viewport};

const SUBPIXEL: f64 = 256.0;
/// Clip-space x/y bound, in multiples of w.
const GUARD_BAND: f32 = 4.0;
const MIN_W: f32 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Varyings {
    pub normal: Vec3,
    pub tangent: Vec4,
    pub uv: Vec2,
    pub view_depth: f32,
}

impl Add for Varyings {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            normal: self.normal + rhs.normal,
            tangent: self.tangent + rhs.tangent,
            uv: self.uv + rhs.uv,
            view_depth: self.view_depth + rhs.view_depth,
        }
    }
}

impl Mul<f32> for Varyings {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            normal: self.normal * rhs,
            tangent: self.tangent * rhs,
            uv: self.uv * rhs,
            view_depth: self.view_depth * rhs,
        }
    }
}

/// Vertex shader output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub position: Vec4,
    pub varyings: Varyings,
}

impl ClipVertex {
    pub fn new(position: Vec4) -> Self {
        Self {
            position,
            varyings: Varyings::default(),
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            varyings: self.varyings * (1.0 - t) + other.varyings * t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    /// Target pixel.
    pub x: u32,
    pub y: u32,
    /// Pixel center in target coordinates.
    pub position: Vec2,
    pub depth: f32,
    pub front_facing: bool,
    pub varyings: Varyings,
}

/// `dot(normal, position) + offset >= 0` keeps a clip-space vertex.
#[derive(Clone, Copy, Debug)]
struct Plane {
    normal: Vec4,
    offset: f32,
}

impl Plane {
    const fn new(normal: Vec4, offset: f32) -> Self {
        Self { normal, offset }
    }

    fn distance(&self, vertex: &ClipVertex) -> f32 {
        self.normal.dot(vertex.position) + self.offset
    }

    fn clip(&self, polygon: &[ClipVertex]) -> Vec<ClipVertex> {
        let mut clipped = Vec::with_capacity(polygon.len() + 1);

        for (i, current) in polygon.iter().enumerate() {
            let next = &polygon[(i + 1) % polygon.len()];
            let (dc, dn) = (self.distance(current), self.distance(next));

            if dc >= 0.0 {
                clipped.push(*current);
            }

            // always interpolate from the inside vertex so shared edges split identically
            if dc >= 0.0 && dn < 0.0 {
                clipped.push(current.lerp(next, dc / (dc - dn)));
            } else if dc < 0.0 && dn >= 0.0 {
                clipped.push(next.lerp(current, dn / (dn - dc)));
            }
        }

        clipped
    }
}

pub struct Rasterizer {
    viewport: Viewport,
    target: (u32, u32),
    state: PipelineState,
}

impl Rasterizer {
    pub fn new(viewport: Viewport, target: (u32, u32), state: PipelineState) -> Self {
        Self {
            viewport,
            target,
            state,
        }
    }

    fn planes(&self) -> Vec<Plane> {
        let mut planes = vec![
            Plane::new(Vec4::W, -MIN_W),
            Plane::new(Vec4::new(-1.0, 0.0, 0.0, GUARD_BAND), 0.0),
            Plane::new(Vec4::new(1.0, 0.0, 0.0, GUARD_BAND), 0.0),
            Plane::new(Vec4::new(0.0, -1.0, 0.0, GUARD_BAND), 0.0),
            Plane::new(Vec4::new(0.0, 1.0, 0.0, GUARD_BAND), 0.0),
        ];
        if !self.state.depth.clamp {
            planes.push(Plane::new(Vec4::Z, 0.0));
        }
        planes
    }

    pub fn triangle(&self, triangle: [ClipVertex; 3], emit: &mut impl FnMut(Fragment)) {
        let mut polygon = triangle.to_vec();
        for plane in self.planes() {
            polygon = plane.clip(&polygon);
            if polygon.len() < 3 {
                return;
            }
        }

        for i in 1..polygon.len() - 1 {
            self.rasterize([polygon[0], polygon[i], polygon[i + 1]], emit);
        }
    }

    fn rasterize(&self, vertices: [ClipVertex; 3], emit: &mut impl FnMut(Fragment)) {
        let (vw, vh) = (self.viewport.width as f64, self.viewport.height as f64);

        let ndc = vertices.map(|v| v.position.truncate() / v.position.w);
        let window = ndc.map(|p| {
            let x = (p.x as f64 * 0.5 + 0.5) * vw;
            let y = (0.5 - p.y as f64 * 0.5) * vh;
            ((x * SUBPIXEL).round() as i64, (y * SUBPIXEL).round() as i64)
        });

        let [mut a, mut b, mut c] = [0, 1, 2];
        let mut area = edge(window[a], window[b], window[c]);
        if area == 0 {
            return;
        }

        // counter-clockwise in NDC is clockwise with y pointing down
        let front_facing = area < 0;
        if self.state.culls(front_facing) {
            return;
        }

        if area < 0 {
            std::mem::swap(&mut b, &mut c);
            area = -area;
        }

        let (pa, pb, pc) = (window[a], window[b], window[c]);
        let min = (pa.0.min(pb.0).min(pc.0), pa.1.min(pb.1).min(pc.1));
        let max = (pa.0.max(pb.0).max(pc.0), pa.1.max(pb.1).max(pc.1));

        let first = |lo: i64| ((lo as f64 / SUBPIXEL - 0.5).floor().max(0.0)) as u32;
        let last = |hi: i64, size: u32| {
            let hi = (hi as f64 / SUBPIXEL - 0.5).ceil();
            (hi.max(0.0) as u32).min(size.saturating_sub(1))
        };
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return;
        }
        let (x0, x1) = (first(min.0), last(max.0, self.viewport.width));
        let (y0, y1) = (first(min.1), last(max.1, self.viewport.height));

        let inv_w = [a, b, c].map(|i| 1.0 / vertices[i].position.w);
        let depth = [a, b, c].map(|i| ndc[i].z);
        let varyings = [a, b, c].map(|i| vertices[i].varyings);

        for py in y0..=y1 {
            for px in x0..=x1 {
                let p = (
                    px as i64 * SUBPIXEL as i64 + SUBPIXEL as i64 / 2,
                    py as i64 * SUBPIXEL as i64 + SUBPIXEL as i64 / 2,
                );

                let e = [edge(pb, pc, p), edge(pc, pa, p), edge(pa, pb, p)];
                let edges = [(pb, pc), (pc, pa), (pa, pb)];
                let covered = e
                    .iter()
                    .zip(edges)
                    .all(|(&e, (from, to))| e > 0 || (e == 0 && is_top_left(from, to)));
                if !covered {
                    continue;
                }

                let (x, y) = (self.viewport.x + px, self.viewport.y + py);
                if x >= self.target.0 || y >= self.target.1 {
                    continue;
                }

                let lambda = e.map(|e| (e as f64 / area as f64) as f32);

                let mut z = lambda[0] * depth[0] + lambda[1] * depth[1] + lambda[2] * depth[2];
                if self.state.depth.clamp {
                    z = z.clamp(0.0, 1.0);
                } else if !(0.0..=1.0).contains(&z) {
                    continue;
                }

                let weights = [0, 1, 2].map(|i| lambda[i] * inv_w[i]);
                let sum = weights[0] + weights[1] + weights[2];
                if sum <= 0.0 {
                    continue;
                }

                emit(Fragment {
                    x,
                    y,
                    position: Vec2::new(x as f32 + 0.5, y as f32 + 0.5),
                    depth: z,
                    front_facing,
                    varyings: varyings[0] * (weights[0] / sum)
                        + varyings[1] * (weights[1] / sum)
                        + varyings[2] * (weights[2] / sum),
                });
            }
        }
    }
}

/// Twice the signed area of `(from, to, p)`.
fn edge(from: (i64, i64), to: (i64, i64), p: (i64, i64)) -> i64 {
    (to.0 - from.0) * (p.1 - from.1) - (to.1 - from.1) * (p.0 - from.0)
}

/// Top edges run left to right, left edges run upwards.
fn is_top_left(from: (i64, i64), to: (i64, i64)) -> bool {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    dy < 0 || (dy == 0 && dx > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CullMode, DepthState};
    use std::collections::HashMap;

    fn rasterizer(width: u32, height: u32) -> Rasterizer {
        Rasterizer::new(
            Viewport::new(width, height),
            (width, height),
            PipelineState::DEFAULT.with_cull(CullMode::None),
        )
    }

    fn vertex(x: f32, y: f32) -> ClipVertex {
        ClipVertex::new(Vec4::new(x, y, 0.5, 1.0))
    }

    fn coverage(rasterizer: &Rasterizer, triangles: &[[ClipVertex; 3]]) -> HashMap<(u32, u32), u32> {
        let mut counts = HashMap::new();
        for &triangle in triangles {
            rasterizer.triangle(triangle, &mut |f: Fragment| {
                *counts.entry((f.x, f.y)).or_insert(0) += 1;
            });
        }
        counts
    }

    #[test]
    fn shared_edges_are_covered_once() {
        let rasterizer = rasterizer(8, 8);
        // the diagonal passes exactly through pixel centers
        let quad = [
            [vertex(-1.0, -1.0), vertex(1.0, -1.0), vertex(1.0, 1.0)],
            [vertex(-1.0, -1.0), vertex(1.0, 1.0), vertex(-1.0, 1.0)],
        ];

        let counts = coverage(&rasterizer, &quad);
        assert_eq!(counts.len(), 64);
        assert!(counts.values().all(|&count| count == 1));
    }

    #[test]
    fn fan_around_a_pixel_center_covers_it_once() {
        let rasterizer = rasterizer(4, 4);
        // (0, 0) in NDC is a pixel corner; shift by half a pixel to land on a center
        let center = vertex(0.25, 0.25);
        let ring = [
            vertex(1.0, 0.25),
            vertex(0.25, 1.0),
            vertex(-1.0, 0.25),
            vertex(0.25, -1.0),
        ];
        let fan: Vec<_> = (0..4)
            .map(|i| [center, ring[i], ring[(i + 1) % 4]])
            .collect();

        let counts = coverage(&rasterizer, &fan);
        assert_eq!(counts.get(&(2, 1)), Some(&1));
        assert!(counts.values().all(|&count| count == 1));
    }

    #[test]
    fn winding_decides_facing() {
        let mut rasterizer = rasterizer(4, 4);
        rasterizer.state = PipelineState::DEFAULT;
        let ccw = [vertex(-1.0, -1.0), vertex(1.0, -1.0), vertex(-1.0, 1.0)];
        let cw = [ccw[0], ccw[2], ccw[1]];

        assert!(!coverage(&rasterizer, &[ccw]).is_empty());
        assert!(coverage(&rasterizer, &[cw]).is_empty());
    }

    #[test]
    fn depth_clamp_keeps_far_geometry() {
        let far = [
            ClipVertex::new(Vec4::new(-1.0, -1.0, 2.0, 1.0)),
            ClipVertex::new(Vec4::new(3.0, -1.0, 2.0, 1.0)),
            ClipVertex::new(Vec4::new(-1.0, 3.0, 2.0, 1.0)),
        ];

        let mut rasterizer = rasterizer(2, 2);
        assert!(coverage(&rasterizer, &[far]).is_empty());

        rasterizer.state.depth = DepthState {
            clamp: true,
            ..rasterizer.state.depth
        };
        let mut depths = vec![];
        rasterizer.triangle(far, &mut |f: Fragment| depths.push(f.depth));
        assert_eq!(depths, vec![1.0; 4]);
    }

    #[test]
    fn near_clipping_keeps_visible_part() {
        let rasterizer = rasterizer(4, 4);
        // one vertex behind the eye
        let triangle = [
            ClipVertex::new(Vec4::new(-1.0, -1.0, 0.5, 1.0)),
            ClipVertex::new(Vec4::new(1.0, -1.0, 0.5, 1.0)),
            ClipVertex::new(Vec4::new(0.0, 1.0, -0.5, -0.5)),
        ];

        let counts = coverage(&rasterizer, &[triangle]);
        assert!(!counts.is_empty());
        assert!(counts.values().all(|&count| count == 1));
    }

    #[test]
    fn offset_viewports_shift_fragments() {
        let triangle = [vertex(-1.0, -1.0), vertex(3.0, -1.0), vertex(-1.0, 3.0)];
        let local = coverage(&rasterizer(4, 4), &[triangle]);
        let offset = coverage(
            &Rasterizer::new(
                Viewport {
                    x: 3,
                    y: 2,
                    width: 4,
                    height: 4,
                },
                (10, 10),
                PipelineState::DEFAULT.with_cull(CullMode::None),
            ),
            &[triangle],
        );

        assert_eq!(local.len(), 16);
        for (x, y) in local.keys() {
            assert_eq!(offset.get(&(x + 3, y + 2)), Some(&1));
        }
    }
}
