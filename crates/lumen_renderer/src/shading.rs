//! Recursive Whitted-style shading.
//!
//! Local Phong illumination with hard or soft shadows, plus mirror
//! reflection and two-interface refraction spawned recursively up to
//! `max_depth`.

use std::cell::Cell;

use lumen_core::{Light, LightKind, Material};
use lumen_math::{Ray, Vec3};
use rand::Rng;

use crate::hittable::HitRecord;
use crate::renderer::{ReflectionGate, RenderConfig};
use crate::scene::{RenderScene, RenderShape};

/// Radiance returned by rays that leave the scene.
pub const BACKGROUND: Vec3 = Vec3::ZERO;

/// Offset applied along the normal to secondary ray origins.
pub const SURFACE_BIAS: f32 = 1e-3;

/// Soft shadow sampling grid (columns, rows) over the light's square.
const SOFT_SHADOW_GRID: (u32, u32) = (5, 4);

/// Side of the square light area sampled for soft shadows.
const SOFT_SHADOW_EXTENT: f32 = 0.5;

/// Traces rays through one prepared scene.
///
/// Not shared between threads: each tile worker owns its own tracer, and
/// the counters are per-tracer.
pub struct Tracer<'a> {
    scene: &'a RenderScene,
    config: &'a RenderConfig,
    rays: Cell<u64>,
    deepest: Cell<u32>,
}

impl<'a> Tracer<'a> {
    pub fn new(scene: &'a RenderScene, config: &'a RenderConfig) -> Self {
        Self {
            scene,
            config,
            rays: Cell::new(0),
            deepest: Cell::new(0),
        }
    }

    /// Number of rays traced so far, shadow rays excluded.
    pub fn rays(&self) -> u64 {
        self.rays.get()
    }

    /// Deepest recursion level reached so far.
    pub fn deepest(&self) -> u32 {
        self.deepest.get()
    }

    /// Radiance along a ray at recursion depth `depth`.
    pub fn trace<R: Rng + ?Sized>(&self, ray: &Ray, depth: u32, rng: &mut R) -> Vec3 {
        self.rays.set(self.rays.get() + 1);
        self.deepest.set(self.deepest.get().max(depth));

        let Some(hit) = self.scene.intersect(ray, self.config.acceleration) else {
            return BACKGROUND;
        };

        if self.config.normals_only {
            return (hit.facing_normal(ray.direction) + Vec3::ONE) * 0.5;
        }

        self.shade(ray, &hit, depth, rng)
    }

    fn shade<R: Rng + ?Sized>(&self, ray: &Ray, hit: &HitRecord, depth: u32, rng: &mut R) -> Vec3 {
        let shape = self.scene.shape(hit.shape);
        let material = shape.material();
        let globals = self.scene.globals();

        let d = ray.direction.normalize();
        let n = hit.facing_normal(d);
        let to_cam = -d;

        let texel = if self.config.texture_mapping {
            shape.texture_color(hit.p, self.config.texture_filter)
        } else {
            None
        };

        let mut color = globals.ka * material.ambient;
        for light in self.scene.lights() {
            color += self.direct_light(light, hit.p, n, to_cam, material, texel, rng);
        }

        let can_recurse = depth < self.config.max_depth;

        if self.config.reflection && can_recurse && self.reflects(material) {
            let reflected = Ray::new(hit.p + n * SURFACE_BIAS, reflect(d, n));
            let radiance = self.trace(&reflected, depth + 1, rng);
            color += globals.ks * material.reflective * radiance;
        }

        if self.config.refraction && can_recurse && material.is_transparent() {
            let radiance = self.transmit(shape, hit, d, n, depth, rng);
            color += globals.kt * material.transparent * radiance;
        }

        color
    }

    fn reflects(&self, material: &Material) -> bool {
        match self.config.reflection_gate {
            ReflectionGate::Reflective => material.is_reflective(),
            ReflectionGate::NonReflectiveOnly => !material.is_reflective(),
        }
    }

    /// Phong contribution of one light, scaled by visibility and spot falloff.
    #[allow(clippy::too_many_arguments)]
    fn direct_light<R: Rng + ?Sized>(
        &self,
        light: &Light,
        p: Vec3,
        n: Vec3,
        to_cam: Vec3,
        material: &Material,
        texel: Option<Vec3>,
        rng: &mut R,
    ) -> Vec3 {
        let globals = self.scene.globals();

        let (l, attenuation) = match light.kind {
            LightKind::Directional => ((-light.direction).normalize_or_zero(), 1.0),
            LightKind::Point | LightKind::Spot => {
                let to_light = light.position - p;
                let dist = to_light.length();
                (
                    to_light.normalize_or_zero(),
                    distance_attenuation(light.attenuation, dist),
                )
            }
        };

        let falloff = match light.kind {
            LightKind::Spot => {
                let cos = (p - light.position)
                    .normalize_or_zero()
                    .dot(light.direction.normalize_or_zero());
                spot_falloff(cos.clamp(0.0, 1.0).acos(), light.angle, light.penumbra)
            }
            _ => 0.0,
        };
        if falloff >= 1.0 {
            return Vec3::ZERO;
        }

        let n_dot_l = n.dot(l).clamp(0.0, 1.0);
        let base = globals.kd * material.diffuse;
        let diffuse = match texel {
            Some(tex) => (material.blend * tex + (1.0 - material.blend) * base) * n_dot_l,
            None => base * n_dot_l,
        };

        let r = 2.0 * l.dot(n) * n - l;
        let highlight = r.dot(to_cam).clamp(0.0, 1.0).powf(material.shininess);
        let specular = globals.ks * highlight * material.specular;

        let visibility = if self.config.shadows {
            self.visibility(light, p, n, rng)
        } else {
            1.0
        };

        visibility * attenuation * light.color * (diffuse + specular) * (1.0 - falloff)
    }

    /// Fraction of the light visible from `p`.
    fn visibility<R: Rng + ?Sized>(&self, light: &Light, p: Vec3, n: Vec3, rng: &mut R) -> f32 {
        let origin = p + n * SURFACE_BIAS;
        let accelerate = self.config.acceleration;

        match light.kind {
            LightKind::Directional => {
                let ray = Ray::new(origin, -light.direction);
                if self.scene.occluded(&ray, f32::INFINITY, accelerate) {
                    0.0
                } else {
                    1.0
                }
            }
            LightKind::Point | LightKind::Spot if self.config.soft_shadows => {
                let (cols, rows) = SOFT_SHADOW_GRID;
                let mut lit = 0u32;
                for i in 0..cols {
                    for j in 0..rows {
                        let sx = (i as f32 + rng.gen::<f32>()) / cols as f32 - 0.5;
                        let sy = (j as f32 + rng.gen::<f32>()) / rows as f32 - 0.5;
                        let sample = light.position
                            + Vec3::new(sx * SOFT_SHADOW_EXTENT, sy * SOFT_SHADOW_EXTENT, 0.0);
                        // Parameter 1 is the light sample itself
                        let ray = Ray::new(origin, sample - origin);
                        if !self.scene.occluded(&ray, 1.0, accelerate) {
                            lit += 1;
                        }
                    }
                }
                lit as f32 / (cols * rows) as f32
            }
            LightKind::Point | LightKind::Spot => {
                let ray = Ray::new(origin, light.position - origin);
                if self.scene.occluded(&ray, 1.0, accelerate) {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    /// Radiance transmitted through the surface at `hit`.
    ///
    /// Entering a solid refracts twice: once here and once where the ray
    /// leaves, found with the inside intersection. A ray already inside
    /// refracts once on its way out. Total internal reflection at either
    /// interface transmits nothing.
    fn transmit<R: Rng + ?Sized>(
        &self,
        shape: &RenderShape,
        hit: &HitRecord,
        d: Vec3,
        n: Vec3,
        depth: u32,
        rng: &mut R,
    ) -> Vec3 {
        let ior = shape.material().ior;
        let Some(inner) = refract(d, hit.normal, ior) else {
            return Vec3::ZERO;
        };
        let start = hit.p - n * SURFACE_BIAS;

        if !hit.front_face(d) {
            return self.trace(&Ray::new(start, inner), depth + 1, rng);
        }

        let inside = Ray::new(start, inner);
        let Some(exit) = shape.intersect_inside(&inside) else {
            return self.trace(&inside, depth + 1, rng);
        };

        let exit_point = inside.at(exit.t);
        let exit_normal = shape.normal_to_world(exit.normal);
        match refract(inner, exit_normal, ior) {
            Some(outer) => {
                let origin = exit_point + exit_normal * SURFACE_BIAS;
                self.trace(&Ray::new(origin, outer), depth + 1, rng)
            }
            None => Vec3::ZERO,
        }
    }
}

/// Mirror direction of `d` about the unit normal `n`.
pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - 2.0 * n.dot(d) * n
}

/// Snell refraction of the unit direction `d` at a surface with outward
/// unit normal `n` and index of refraction `ior`.
///
/// A direction with positive `d·n` is leaving the solid. Returns `None`
/// on total internal reflection.
pub fn refract(d: Vec3, n: Vec3, ior: f32) -> Option<Vec3> {
    let (n, eta) = if d.dot(n) > 0.0 {
        (-n, ior)
    } else {
        (n, 1.0 / ior)
    };

    let cos_i = (-d.dot(n)).clamp(-1.0, 1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(eta * d + (eta * cos_i - cos_t) * n)
}

/// `min(1, 1 / (c0 + c1 d + c2 d^2))`.
pub fn distance_attenuation(coefficients: Vec3, dist: f32) -> f32 {
    let denom = coefficients.x + coefficients.y * dist + coefficients.z * dist * dist;
    if denom <= 0.0 {
        return 1.0;
    }
    (1.0 / denom).min(1.0)
}

/// Spot falloff for a point at angle `x` off the spot axis: 0 inside the
/// inner cone, 1 at or beyond `angle`, a cubic ramp in the penumbra.
pub fn spot_falloff(x: f32, angle: f32, penumbra: f32) -> f32 {
    let inner = angle - penumbra;
    if x >= angle {
        1.0
    } else if x <= inner {
        0.0
    } else {
        let s = (x - inner) / penumbra;
        -2.0 * s * s * s + 3.0 * s * s
    }
}
