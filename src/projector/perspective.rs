//! Implements the perspective (gnomonic) projection family.
//!
//! This is the classic pinhole mapping: a view-space direction is scaled onto
//! the plane one unit down the view axis, so a point at angle `θ` from the
//! axis lands at plane radius `tan(θ)`. Straight lines on the sky stay
//! straight, at the price of rapidly growing distortion toward the edge,
//! which is why the family caps out at a 120° field of view.

use nalgebra::Vector3;

use crate::projector::Projection;

/// The perspective projection family. Stateless; viewport and FOV state
/// lives in the owning [`Projector`](crate::projector::Projector).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveProjection;

impl PerspectiveProjection {
    pub const MAX_FOV: f64 = 120.0;

    /// Relative zoom step per increment; perspective zoom feels uniform when
    /// it is multiplicative in the FOV.
    const ZOOM_RATE: f64 = 0.05;
    /// Lower bound on the zoom step, in degrees, so zooming never stalls
    /// near 0°.
    const MIN_DELTA_ZOOM: f64 = 1e-4;
}

impl Projection for PerspectiveProjection {
    fn name(&self) -> &'static str {
        "perspective"
    }

    fn max_fov(&self) -> f64 {
        Self::MAX_FOV
    }

    fn forward(&self, v: &mut Vector3<f64>) -> bool {
        let r = v.norm();
        if v.z < 0.0 {
            let f = -1.0 / v.z;
            v.x *= f;
            v.y *= f;
            v.z = r;
            return true;
        }
        if v.z > 0.0 {
            // Behind the observer; the mirrored plane coordinate is not a
            // valid image.
            let f = 1.0 / v.z;
            v.x *= f;
            v.y *= f;
            v.z = r;
            return false;
        }
        // Exactly 90° off axis: push the plane coordinate out to infinity.
        v.x *= 1e99;
        v.y *= 1e99;
        v.z = r;
        false
    }

    fn backward(&self, v: &mut Vector3<f64>) -> bool {
        // Every plane coordinate corresponds to a direction in the forward
        // hemisphere.
        let f = (1.0 / (1.0 + v.x * v.x + v.y * v.y)).sqrt();
        v.x *= f;
        v.y *= f;
        v.z = -f;
        true
    }

    fn delta_zoom(&self, fov: f64) -> f64 {
        (fov * Self::ZOOM_RATE).max(Self::MIN_DELTA_ZOOM)
    }

    fn fov_to_view_scaling_factor(&self, fov: f64) -> f64 {
        fov.tan()
    }

    fn view_scaling_factor_to_fov(&self, vsf: f64) -> f64 {
        vsf.atan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_preserves_length_in_z() {
        let original = Vector3::new(1.5, -2.0, -4.0);
        let mut v = original;

        assert!(PerspectiveProjection.forward(&mut v));
        assert_relative_eq!(v.z, original.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_forward_rejects_directions_behind_observer() {
        let mut behind = Vector3::new(0.1, 0.2, 1.0);
        assert!(!PerspectiveProjection.forward(&mut behind));

        // Exactly 90° off the view axis is already outside the domain.
        let mut sideways = Vector3::new(1.0, 0.0, 0.0);
        assert!(!PerspectiveProjection.forward(&mut sideways));
    }

    #[test]
    fn test_forward_backward_round_trip() {
        let direction = Vector3::new(0.3, -0.4, -1.0).normalize();
        let mut v = direction * 7.0;

        assert!(PerspectiveProjection.forward(&mut v));
        assert!(PerspectiveProjection.backward(&mut v));

        // The recovered direction is the original one, normalized.
        assert_relative_eq!(v, direction, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_yields_unit_direction() {
        let mut v = Vector3::new(0.8, -0.3, 0.0);
        assert!(PerspectiveProjection.backward(&mut v));
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
        assert!(v.z < 0.0);
    }

    #[test]
    fn test_fov_scaling_factor_inverse_law() {
        let projection = PerspectiveProjection;
        // FOV radii up to the 60° supported by the 120° max FOV.
        for step in 1..=60 {
            let fov = (step as f64).to_radians();
            let vsf = projection.fov_to_view_scaling_factor(fov);
            assert_relative_eq!(
                projection.view_scaling_factor_to_fov(vsf),
                fov,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_delta_zoom_positive_and_monotonic() {
        let projection = PerspectiveProjection;
        let mut previous = 0.0;
        for step in 1..=1200 {
            let fov = step as f64 * 0.1;
            let delta = projection.delta_zoom(fov);
            assert!(delta > 0.0, "delta zoom not positive at fov {fov}");
            assert!(
                delta >= previous,
                "delta zoom decreased between fov {} and {}",
                fov - 0.1,
                fov
            );
            previous = delta;
        }
    }

    #[test]
    fn test_delta_zoom_floor_near_zero() {
        let delta = PerspectiveProjection.delta_zoom(1e-9);
        assert!(delta >= 1e-4);
    }
}
