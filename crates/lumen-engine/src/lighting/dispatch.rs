use bytemuck::{Pod, Zeroable};
use glam::UVec3;

use crate::config::TileConfig;

/// Thread and thread-group counts of the frustum compute pass.
///
/// One thread per tile: `num_threads = ceil(screen / block)`, and one
/// `block × block` workgroup per block of tiles:
/// `num_thread_groups = ceil(num_threads / block)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DispatchParameters {
    pub num_threads: UVec3,
    pub num_thread_groups: UVec3,
}

impl DispatchParameters {
    pub fn for_screen(tiles: &TileConfig) -> Self {
        let b = tiles.block_size.max(1);
        let num_threads = UVec3::new(tiles.width.div_ceil(b), tiles.height.div_ceil(b), 1);
        let num_thread_groups = UVec3::new(num_threads.x.div_ceil(b), num_threads.y.div_ceil(b), 1);
        Self { num_threads, num_thread_groups }
    }

    /// Number of tiles, which is also the number of frustums.
    ///
    /// Saturates at `u32::MAX`; a validated [`TileConfig`] stays far below.
    pub fn tile_count(&self) -> u32 {
        self.num_threads
            .x
            .checked_mul(self.num_threads.y)
            .and_then(|n| n.checked_mul(self.num_threads.z))
            .unwrap_or(u32::MAX)
    }

    pub fn uniform(&self) -> DispatchParamsUniform {
        DispatchParamsUniform {
            num_thread_groups: self.num_thread_groups.extend(0).to_array(),
            num_threads: self.num_threads.extend(0).to_array(),
        }
    }
}

/// GPU layout of `DispatchParams` (two `vec3<u32>`, each padded to 16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchParamsUniform {
    pub num_thread_groups: [u32; 4],
    pub num_threads: [u32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(width: u32, height: u32, block_size: u32) -> DispatchParameters {
        DispatchParameters::for_screen(&TileConfig { width, height, block_size })
    }

    #[test]
    fn full_hd_with_16px_tiles() {
        let p = params(1920, 1080, 16);
        assert_eq!(p.num_threads, UVec3::new(120, 68, 1));
        assert_eq!(p.num_thread_groups, UVec3::new(8, 5, 1));
    }

    #[test]
    fn svga_tile_count() {
        let p = params(800, 600, 16);
        assert_eq!(p.num_threads, UVec3::new(50, 38, 1));
        assert_eq!(p.tile_count(), 1900);
    }

    #[test]
    fn exact_multiples_do_not_round_up() {
        let p = params(256, 256, 16);
        assert_eq!(p.num_threads, UVec3::new(16, 16, 1));
        assert_eq!(p.num_thread_groups, UVec3::new(1, 1, 1));
    }

    #[test]
    fn counts_are_exact_ceilings() {
        for (w, h, b) in [(1, 1, 16), (1280, 720, 16), (1921, 1081, 8), (640, 480, 5), (17, 3, 16)] {
            let p = params(w, h, b);
            let nt = UVec3::new(w.div_ceil(b), h.div_ceil(b), 1);
            assert_eq!(p.num_threads, nt, "{w}x{h}/{b}");
            assert_eq!(
                p.num_thread_groups,
                UVec3::new(nt.x.div_ceil(b), nt.y.div_ceil(b), 1),
                "{w}x{h}/{b}"
            );
            assert!(p.num_threads.x * b >= w && p.num_threads.y * b >= h);
        }
    }

    #[test]
    fn tile_count_saturates_instead_of_wrapping() {
        let p = params(70_000, 70_000, 1);
        assert_eq!(p.tile_count(), u32::MAX);
    }

    #[test]
    fn uniform_is_two_padded_vectors() {
        assert_eq!(std::mem::size_of::<DispatchParamsUniform>(), 32);
        let u = params(1920, 1080, 16).uniform();
        assert_eq!(u.num_thread_groups, [8, 5, 1, 0]);
        assert_eq!(u.num_threads, [120, 68, 1, 0]);
    }
}
