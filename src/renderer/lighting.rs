//! Light evaluation for wall columns and floor/ceiling rows, distance
//! attenuation and the final pixel shade.

use glam::Vec3;

use crate::renderer::{Pixel, DIMMING_DISTANCE, VERTICAL_FADE_DISTANCE};
use crate::texture::Rgb;
use crate::world::{Level, SurfaceLights};

#[cfg(feature = "quantized-lighting")]
use crate::renderer::LIGHT_STEPS;

/// Distance dimming subtracted from the surface light value.
///
/// Quantized mode buckets the distance into [`LIGHT_STEPS`] bands; otherwise
/// the falloff is a continuous linear ramp reaching full darkness at
/// [`DIMMING_DISTANCE`].
#[inline]
pub(crate) fn attenuation(point_distance: f32) -> f32 {
    #[cfg(feature = "quantized-lighting")]
    {
        let step = DIMMING_DISTANCE / LIGHT_STEPS as f32;
        (point_distance / step).floor() / LIGHT_STEPS as f32
    }
    #[cfg(not(feature = "quantized-lighting"))]
    {
        point_distance / DIMMING_DISTANCE
    }
}

/// Light value on a wall at `sample`, from the owning segment's light list.
///
/// The result is the maximum of the sector brightness and each light's
/// `strength * (1 - d^2/r^2)`, gated by the light radius.  With
/// `dynamic-shadows` each contribution additionally requires an unoccluded
/// path from the sample to the light.
#[inline]
pub(crate) fn vertical_surface_light(
    level: &Level,
    lights: &SurfaceLights,
    brightness: f32,
    sample: Vec3,
) -> f32 {
    let mut value = brightness;
    for &id in lights {
        let light = &level.lights[id as usize];
        let d_sq = light.position.distance_squared(sample);
        if d_sq > light.radius_sq {
            continue;
        }
        #[cfg(feature = "dynamic-shadows")]
        if level
            .cache
            .intersect_3d(sample, light.position, &level.linedefs, &level.vertices)
        {
            continue;
        }
        value = value.max((light.strength * (1.0 - d_sq * light.radius_sq_inv)).max(0.0));
    }
    value
}

/// Light value on a floor or ceiling at `sample`, from the cache cell's
/// light list (`None` outside the grid: ambient only).
///
/// Lights on the wrong side of the plane are rejected, and a light close to
/// the plane fades with `min(1, dz / VERTICAL_FADE_DISTANCE)` so it cannot
/// appear to slice through the surface as it crosses it.
#[inline]
pub(crate) fn horizontal_surface_light(
    level: &Level,
    lights: Option<&SurfaceLights>,
    brightness: f32,
    sample: Vec3,
    surface_height: f32,
    is_floor: bool,
) -> f32 {
    let mut value = brightness;
    let Some(lights) = lights else {
        return value;
    };

    for &id in lights {
        let light = &level.lights[id as usize];
        let dz = light.position.z - surface_height;
        if (is_floor && dz <= 0.0) || (!is_floor && dz >= 0.0) {
            continue;
        }

        let d_sq = light.position.distance_squared(sample);
        if d_sq > light.radius_sq {
            continue;
        }
        #[cfg(feature = "dynamic-shadows")]
        if level
            .cache
            .intersect_3d(sample, light.position, &level.linedefs, &level.vertices)
        {
            continue;
        }

        let fade = (dz.abs() / VERTICAL_FADE_DISTANCE).min(1.0);
        value = value.max((light.strength * (1.0 - d_sq * light.radius_sq_inv) * fade).max(0.0));
    }
    value
}

/// Multiply a sampled texel by the light value, clamp to 255 per channel and
/// pack as opaque ARGB.
#[cfg(all(feature = "simd-lighting", target_arch = "x86_64"))]
#[inline(always)]
pub(crate) fn shade(rgb: Rgb, light: f32) -> Pixel {
    use std::arch::x86_64::*;
    // SAFETY: SSE2 is part of the x86_64 baseline.
    unsafe {
        // Lanes ordered so the byte-pack lands as 0x00RRGGBB.
        let texel = _mm_set_ps(0.0, rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
        let lit = _mm_min_ps(_mm_mul_ps(texel, _mm_set1_ps(light)), _mm_set1_ps(255.0));
        let ints = _mm_cvttps_epi32(_mm_max_ps(lit, _mm_setzero_ps()));
        let packed16 = _mm_packs_epi32(ints, ints);
        let packed8 = _mm_packus_epi16(packed16, packed16);
        0xFF00_0000 | _mm_cvtsi128_si32(packed8) as u32
    }
}

#[cfg(not(all(feature = "simd-lighting", target_arch = "x86_64")))]
#[inline(always)]
pub(crate) fn shade(rgb: Rgb, light: f32) -> Pixel {
    let light = light.max(0.0);
    let r = ((rgb[0] as f32 * light) as u32).min(255);
    let g = ((rgb[1] as f32 * light) as u32).min(255);
    let b = ((rgb[2] as f32 * light) as u32).min(255);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
