//! Implements the stereographic projection family.
//!
//! Stereographic projection maps the sphere onto the plane from the point
//! opposite the view axis: a direction at angle `θ` from the axis lands at
//! plane radius `2·tan(θ/2)`. The mapping is conformal and covers everything
//! except the single antipodal direction, which makes it the workhorse for
//! wide fields of view where perspective has long since blown up.

use nalgebra::Vector3;

use crate::projector::Projection;

/// The stereographic projection family. Stateless; viewport and FOV state
/// lives in the owning [`Projector`](crate::projector::Projector).
#[derive(Debug, Clone, Copy, Default)]
pub struct StereographicProjection;

impl StereographicProjection {
    pub const MAX_FOV: f64 = 235.0;

    /// Relative zoom step per increment, applied in view-scaling-factor
    /// space so the on-screen magnification change stays uniform.
    const ZOOM_RATE: f64 = 0.05;
    /// Lower bound on the zoom step, in degrees.
    const MIN_DELTA_ZOOM: f64 = 1e-4;
}

impl Projection for StereographicProjection {
    fn name(&self) -> &'static str {
        "stereographic"
    }

    fn max_fov(&self) -> f64 {
        Self::MAX_FOV
    }

    fn forward(&self, v: &mut Vector3<f64>) -> bool {
        let r = v.norm();
        // h = r·cos²(θ/2) for a direction at angle θ from the view axis;
        // it only vanishes at the antipodal point (or for the zero vector).
        let h = 0.5 * (r - v.z);
        if h <= 0.0 {
            return false;
        }
        let f = 1.0 / h;
        v.x *= f;
        v.y *= f;
        v.z = r;
        true
    }

    fn backward(&self, v: &mut Vector3<f64>) -> bool {
        // The whole plane is the image of the sphere minus the antipode, so
        // every plane coordinate unprojects.
        let lqq = 0.25 * (v.x * v.x + v.y * v.y);
        let f = 1.0 / (lqq + 1.0);
        v.x *= f;
        v.y *= f;
        v.z = (lqq - 1.0) * f;
        true
    }

    fn delta_zoom(&self, fov: f64) -> f64 {
        // A uniform multiplicative step in view-scaling-factor space, mapped
        // back to a FOV increment.
        let half_fov_rad = (0.5 * fov).to_radians();
        let vsf = self.fov_to_view_scaling_factor(half_fov_rad);
        let next_half_fov_rad = self.view_scaling_factor_to_fov(vsf * (1.0 + Self::ZOOM_RATE));
        let delta = 2.0 * next_half_fov_rad.to_degrees() - fov;
        delta.max(Self::MIN_DELTA_ZOOM)
    }

    fn fov_to_view_scaling_factor(&self, fov: f64) -> f64 {
        2.0 * (0.5 * fov).tan()
    }

    fn view_scaling_factor_to_fov(&self, vsf: f64) -> f64 {
        2.0 * (0.5 * vsf).atan()
    }
}
