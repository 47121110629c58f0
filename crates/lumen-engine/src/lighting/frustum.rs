//! Per-tile view frustums.
//!
//! [`Frustum::for_tile`] is the CPU twin of `frustum_cs.wgsl`: the same corner
//! unprojection, plane construction and orientation, evaluated on the host for
//! tests and diagnostics.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::config::{ConfigError, TileConfig};

/// `dot(normal, p) - distance >= 0` for points on the inner side.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    pub normal: [f32; 3],
    pub distance: f32,
}

impl Plane {
    /// Plane through three points, normal following the winding `p0 → p1 → p2`.
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let n = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        Self::new(n, n.dot(p0))
    }

    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.to_array(), distance }
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal().dot(p) - self.distance
    }

    /// Flips the plane if needed so that `inside` is on its inner side.
    pub fn facing(self, inside: Vec3) -> Self {
        if self.signed_distance(inside) < 0.0 {
            Self::new(-self.normal(), -self.distance)
        } else {
            self
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaneSide {
    Left = 0,
    Right = 1,
    Top = 2,
    Bottom = 3,
    Near = 4,
    Far = 5,
}

/// Six view-space planes bounding one screen tile.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn plane(&self, side: PlaneSide) -> &Plane {
        &self.planes[side as usize]
    }

    /// Far-plane corners of `tile` in view space:
    /// top-left, top-right, bottom-left, bottom-right.
    pub fn tile_corners(tile: UVec2, block_size: u32, s2v: &ScreenToView) -> [Vec3; 4] {
        let min = (tile * block_size).as_vec2();
        let max = ((tile + UVec2::ONE) * block_size).as_vec2();
        [
            s2v.screen_to_view(Vec2::new(min.x, min.y), 1.0),
            s2v.screen_to_view(Vec2::new(max.x, min.y), 1.0),
            s2v.screen_to_view(Vec2::new(min.x, max.y), 1.0),
            s2v.screen_to_view(Vec2::new(max.x, max.y), 1.0),
        ]
    }

    pub fn for_tile(tile: UVec2, block_size: u32, s2v: &ScreenToView) -> Self {
        let [tl, tr, bl, br] = Self::tile_corners(tile, block_size, s2v);

        let centre_px = ((tile.as_vec2() + Vec2::splat(0.5)) * block_size as f32).floor();
        let far = s2v.screen_to_view(centre_px, 1.0);
        let near = s2v.screen_to_view(centre_px, 0.0);

        let eye = Vec3::ZERO;
        let axis = Vec3::new(0.0, 0.0, (far.z - near.z).signum());

        Self {
            planes: [
                Plane::from_points(eye, bl, tl).facing(far),
                Plane::from_points(eye, tr, br).facing(far),
                Plane::from_points(eye, tl, tr).facing(far),
                Plane::from_points(eye, br, bl).facing(far),
                Plane::new(axis, axis.dot(near)),
                Plane::new(-axis, -axis.dot(far)),
            ],
        }
    }

    /// All frustums of the screen, row-major by tile.
    pub fn for_screen(tiles: &TileConfig, s2v: &ScreenToView) -> Result<Vec<Self>, ConfigError> {
        tiles.validate()?;
        let b = tiles.block_size;
        let (nx, ny) = (tiles.width.div_ceil(b), tiles.height.div_ceil(b));
        Ok((0..ny)
            .flat_map(|y| (0..nx).map(move |x| UVec2::new(x, y)))
            .map(|tile| Self::for_tile(tile, b, s2v))
            .collect())
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// Conservative sphere test used for light culling.
    pub fn contains_sphere(&self, centre: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(centre) >= -radius)
    }
}

/// Maps screen pixels to view space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenToView {
    pub inverse_projection: Mat4,
    pub screen: Vec2,
}

impl ScreenToView {
    pub fn new(inverse_projection: Mat4, tiles: &TileConfig) -> Self {
        Self {
            inverse_projection,
            screen: Vec2::new(tiles.width as f32, tiles.height as f32),
        }
    }

    pub fn clip_to_view(&self, clip: Vec4) -> Vec3 {
        let v = self.inverse_projection * clip;
        v.xyz() / v.w
    }

    /// `depth` is in clip space: 0 at the near plane, 1 at the far plane.
    pub fn screen_to_view(&self, screen: Vec2, depth: f32) -> Vec3 {
        let uv = screen / self.screen;
        let clip = Vec4::new(uv.x * 2.0 - 1.0, (1.0 - uv.y) * 2.0 - 1.0, depth, 1.0);
        self.clip_to_view(clip)
    }

    pub fn uniform(&self) -> ScreenToViewUniform {
        ScreenToViewUniform {
            inverse_projection: self.inverse_projection.to_cols_array_2d(),
            screen_dimensions: self.screen.to_array(),
            _pad: [0.0; 2],
        }
    }
}

/// GPU layout of `ScreenToViewParams`.
///
/// glam and WGSL are both column-major, so the matrix uploads as is.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ScreenToViewUniform {
    pub inverse_projection: [[f32; 4]; 4],
    pub screen_dimensions: [f32; 2],
    pub _pad: [f32; 2],
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::lighting::inverse_perspective;

    fn svga() -> (TileConfig, ScreenToView) {
        let tiles = TileConfig { width: 800, height: 600, block_size: 16 };
        let proj = Mat4::perspective_lh(60f32.to_radians(), 800.0 / 600.0, 0.1, 100.0);
        let s2v = ScreenToView::new(inverse_perspective(&proj).unwrap(), &tiles);
        (tiles, s2v)
    }

    #[test]
    fn gpu_layouts() {
        assert_eq!(std::mem::size_of::<Plane>(), 16);
        assert_eq!(std::mem::size_of::<Frustum>(), 96);
        assert_eq!(std::mem::size_of::<ScreenToViewUniform>(), 80);
    }

    #[test]
    fn screen_centre_maps_to_view_axis() {
        let (_, s2v) = svga();
        let far = s2v.screen_to_view(Vec2::new(400.0, 300.0), 1.0);
        let near = s2v.screen_to_view(Vec2::new(400.0, 300.0), 0.0);

        assert_relative_eq!(far.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(far.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(far.z, 100.0, max_relative = 1e-3);
        assert_relative_eq!(near.z, 0.1, max_relative = 1e-3);
    }

    #[test]
    fn top_of_screen_is_positive_y() {
        let (_, s2v) = svga();
        assert!(s2v.screen_to_view(Vec2::new(400.0, 0.0), 1.0).y > 0.0);
        assert!(s2v.screen_to_view(Vec2::new(0.0, 300.0), 1.0).x < 0.0);
    }

    #[test]
    fn every_svga_tile_is_non_degenerate() {
        let (tiles, s2v) = svga();
        let frustums = Frustum::for_screen(&tiles, &s2v).unwrap();
        assert_eq!(frustums.len(), 1900);

        for ty in 0..38 {
            for tx in 0..50 {
                let tile = UVec2::new(tx, ty);
                let corners = Frustum::tile_corners(tile, 16, &s2v);
                for i in 0..4 {
                    for j in (i + 1)..4 {
                        let a = corners[i].normalize();
                        let b = corners[j].normalize();
                        assert!(a.distance(b) > 1e-5, "tile {tile}: rays {i} and {j} coincide");
                    }
                }

                let f = &frustums[(ty * 50 + tx) as usize];
                for plane in &f.planes {
                    assert_relative_eq!(plane.normal().length(), 1.0, epsilon = 1e-4);
                }

                let centre = (tile.as_vec2() + 0.5) * 16.0;
                let mid = s2v.screen_to_view(centre, 0.9);
                assert!(f.contains_point(mid), "tile {tile} excludes its own centre");
            }
        }
    }

    #[test]
    fn for_screen_rejects_zero_block_size() {
        let (tiles, s2v) = svga();
        let err = Frustum::for_screen(&TileConfig { block_size: 0, ..tiles }, &s2v).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn neighbouring_tiles_share_a_plane() {
        let (_, s2v) = svga();
        let a = Frustum::for_tile(UVec2::new(10, 7), 16, &s2v);
        let b = Frustum::for_tile(UVec2::new(11, 7), 16, &s2v);

        let right = a.plane(PlaneSide::Right).normal();
        let left = b.plane(PlaneSide::Left).normal();
        assert_relative_eq!(right.dot(left), -1.0, epsilon = 1e-4);
    }

    #[test]
    fn sphere_culling() {
        let (_, s2v) = svga();
        let f = Frustum::for_tile(UVec2::new(25, 19), 16, &s2v);
        let inside = s2v.screen_to_view(Vec2::new(408.0, 312.0), 0.99);

        assert!(f.contains_sphere(inside, 0.1));
        // Far off to the left of the tile, even with a generous radius.
        assert!(!f.contains_sphere(inside + Vec3::new(-50.0, 0.0, 0.0), 1.0));
        // Behind the eye.
        assert!(!f.contains_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
    }
}
