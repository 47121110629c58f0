use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LightConfig;

/// Capacity of the GPU light buffer.
pub const MAX_LIGHTS: usize = 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// World space. Ignored for directional lights.
    pub position: Vec3,
    /// Direction the light travels. Ignored for point lights.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Distance at which a point light's contribution reaches zero.
    pub range: f32,
}

impl Light {
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::ZERO,
            color,
            intensity,
            range,
        }
    }

    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range: 0.0,
        }
    }

    pub fn to_gpu(&self) -> GpuLight {
        let kind = match self.kind {
            LightKind::Point => 0.0,
            LightKind::Directional => 1.0,
        };
        GpuLight {
            position_range: self.position.extend(self.range).to_array(),
            direction_kind: self.direction.extend(kind).to_array(),
            color_intensity: self.color.extend(self.intensity).to_array(),
        }
    }
}

/// GPU layout of one `Light` in the light buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position_range: [f32; 4],
    /// `w` is 0 for point lights, 1 for directional lights.
    pub direction_kind: [f32; 4],
    pub color_intensity: [f32; 4],
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("light list is full ({} lights)", MAX_LIGHTS)]
pub struct LightListFull;

/// Bounded set of scene lights.
///
/// `version` changes on every mutation so consumers can skip re-uploading an
/// unchanged list.
#[derive(Debug, Clone, Default)]
pub struct LightList {
    lights: Vec<Light>,
    version: u64,
}

impl LightList {
    pub fn new() -> Self {
        Self::default()
    }

    /// One white-ish directional light plus `config.count - 1` point lights
    /// scattered over the configured volume. Deterministic for a given seed.
    pub fn random(config: &LightConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut list = Self::new();
        let count = (config.count as usize).min(MAX_LIGHTS);
        if count == 0 {
            return list;
        }

        list.lights.push(Light::directional(
            Vec3::new(-0.3, -1.0, 0.4),
            Vec3::new(1.0, 0.97, 0.9),
            0.35,
        ));

        let h = config.half_extent;
        for _ in 1..count {
            let position = Vec3::new(
                rng.gen_range(-h..=h),
                rng.gen_range(0.0..=config.max_height),
                rng.gen_range(-h..=h),
            );
            let color = Vec3::new(
                rng.gen_range(0.2..=1.0),
                rng.gen_range(0.2..=1.0),
                rng.gen_range(0.2..=1.0),
            );
            let intensity = rng.gen_range(0.5..=2.0);
            let range = rng.gen_range(config.min_range..=config.max_range);
            list.lights.push(Light::point(position, color, intensity, range));
        }

        list.version = 1;
        log::info!("generated {} lights (seed {:#x})", list.len(), config.seed);
        list
    }

    pub fn push(&mut self, light: Light) -> Result<(), LightListFull> {
        if self.lights.len() >= MAX_LIGHTS {
            return Err(LightListFull);
        }
        self.lights.push(light);
        self.version += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        if !self.lights.is_empty() {
            self.lights.clear();
            self.version += 1;
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Light> {
        let light = self.lights.get_mut(index)?;
        self.version += 1;
        Some(light)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn to_gpu(&self) -> Vec<GpuLight> {
        self.lights.iter().map(Light::to_gpu).collect()
    }
}
