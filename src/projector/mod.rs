//! Projection of sky directions into viewport pixel coordinates.
//!
//! This module provides the main interface for all operations of projecting
//! coordinates from sky to screen. A [`Projector`] chains a shared
//! [`ModelViewTransform`](crate::transform::ModelViewTransform) with a
//! concrete [`Projection`] family and maps the resulting plane coordinates
//! into the viewport. Two families are provided:
//! - [`PerspectiveProjection`](perspective::PerspectiveProjection)
//! - [`StereographicProjection`](stereographic::StereographicProjection)

pub mod perspective;
pub mod stereographic;

use std::fmt;
use std::sync::Arc;

use log::debug;
use nalgebra::{Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::transform::{ModelViewTransform, TransformError};

/// The viewport rectangle: lower-left corner position plus size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// All the parameters needed to initialize a [`Projector`].
///
/// This is a plain value type exchanged with the owning orchestrator; no
/// serialization format is implied here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectorParams {
    /// Viewport position and size in pixels.
    pub viewport: Viewport,
    /// Diameter of the field of view disk, in degrees.
    pub fov: f64,
    /// Near clipping plane distance.
    pub z_near: f64,
    /// Far clipping plane distance.
    pub z_far: f64,
    /// Viewport center in screen pixels.
    pub viewport_center: Vector2<f64>,
    /// Diameter of the FOV disk, in pixels.
    pub viewport_fov_diameter: f64,
}

impl Default for ProjectorParams {
    fn default() -> Self {
        ProjectorParams {
            viewport: Viewport {
                x: 0,
                y: 0,
                width: 256,
                height: 256,
            },
            fov: 60.0,
            z_near: 0.0,
            z_far: 1.0,
            viewport_center: Vector2::new(128.0, 128.0),
            viewport_fov_diameter: 256.0,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectorError {
    #[error("Projector parameters have not been initialized")]
    NotInitialized,
    #[error("Direction has no valid image under the current projection")]
    DirectionNotProjectable,
    #[error("Window coordinate has no corresponding view direction")]
    PointNotUnprojectable,
    #[error("Viewport width and height must be positive")]
    ViewportMustBePositive,
    #[error("Field of view {fov}° is outside the valid range (0°, {max_fov}°]")]
    FovOutOfRange { fov: f64, max_fov: f64 },
    #[error("FOV disk diameter must be positive")]
    FovDiameterMustBePositive,
    #[error("Near and far clipping planes must not coincide")]
    DegenerateClipPlanes,
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// The family-specific half of a [`Projector`]: the nonlinear mapping between
/// view-space directions and normalized plane coordinates.
///
/// Implementations are stateless; all viewport and FOV state lives in the
/// [`Projector`] that owns them.
pub trait Projection: fmt::Debug + Send + Sync {
    /// Short lower-case family name, used in log output.
    fn name(&self) -> &'static str;

    /// The maximum FOV disk diameter in degrees this family supports.
    ///
    /// Enforced when a [`Projector`] is initialized; `forward` never clamps.
    fn max_fov(&self) -> f64;

    /// Apply the projection in the forward direction, in place.
    ///
    /// After the transformation `v.z` always contains the length of the
    /// original `v`: `sqrt(x² + y² + z²)`, regardless of the projection
    /// family. This makes it possible to implement depth buffer testing in a
    /// way independent of the projection type. The squared length would be
    /// cheaper but breaks depth handling for distant objects, so the plain
    /// length it is.
    ///
    /// Returns `false` when `v` has no valid image under this projection
    /// (e.g. behind the observer); the contents of `v` are then undefined.
    fn forward(&self, v: &mut Vector3<f64>) -> bool;

    /// Apply the projection in the backward direction, in place.
    ///
    /// On entry `v.x`/`v.y` hold normalized plane coordinates and `v.z` is
    /// ignored; on success `v` holds a unit view-space direction. Returns
    /// `false` when the plane coordinate is outside this family's invertible
    /// range.
    fn backward(&self, v: &mut Vector3<f64>) -> bool;

    /// The small FOV increment, in degrees, to use at the given FOV for nice
    /// zoom movements.
    ///
    /// Strictly positive and continuous over `(0, max_fov]`, with smaller
    /// absolute steps at smaller FOV so zooming feels perceptually uniform.
    fn delta_zoom(&self, fov: f64) -> f64;

    /// Convert a field of view radius, in radians, to the view scaling
    /// factor used internally to derive the pixels-per-radian scale.
    fn fov_to_view_scaling_factor(&self, fov: f64) -> f64;

    /// Convert a view scaling factor back to a field of view radius in
    /// radians. Exact inverse of
    /// [`fov_to_view_scaling_factor`](Self::fov_to_view_scaling_factor).
    fn view_scaling_factor_to_fov(&self, vsf: f64) -> f64;
}

/// Common validation functions for projector parameters.
pub mod validation {
    use super::*;

    pub fn validate_viewport(viewport: &Viewport) -> Result<(), ProjectorError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ProjectorError::ViewportMustBePositive);
        }
        Ok(())
    }

    pub fn validate_params(
        params: &ProjectorParams,
        max_fov: f64,
    ) -> Result<(), ProjectorError> {
        validate_viewport(&params.viewport)?;
        if params.fov <= 0.0 || params.fov > max_fov {
            return Err(ProjectorError::FovOutOfRange {
                fov: params.fov,
                max_fov,
            });
        }
        if params.viewport_fov_diameter <= 0.0 {
            return Err(ProjectorError::FovDiameterMustBePositive);
        }
        if params.z_near == params.z_far {
            return Err(ProjectorError::DegenerateClipPlanes);
        }
        Ok(())
    }
}

/// Projects direction vectors from an arbitrary reference frame into the
/// viewport, and back.
///
/// A projector is constructed stale: [`init`](Projector::init) must run
/// before any per-vector call, and every parameter change goes through
/// `init` again, which revalidates the parameters and recomputes the derived
/// scale factors atomically. Per-vector calls on a stale projector fail with
/// [`ProjectorError::NotInitialized`].
///
/// A projector is immutable during projection, so concurrent read-only
/// [`project`](Projector::project)/[`unproject`](Projector::unproject) calls
/// are safe. Parallel views should each own their own projector, with the
/// model-view transform cloned via
/// [`clone_boxed`](ModelViewTransform::clone_boxed) at the point of
/// divergence.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use nalgebra::Vector3;
/// use sky_projector::{Mat4Transform, PerspectiveProjection, Projector, ProjectorParams};
///
/// let mut projector = Projector::new(
///     Box::new(PerspectiveProjection),
///     Arc::new(Mat4Transform::identity()),
/// );
/// projector.init(ProjectorParams::default()).unwrap();
///
/// // Looking straight down the view axis lands on the viewport center.
/// let win = projector.project(&Vector3::new(0.0, 0.0, -1.0)).unwrap();
/// assert!((win.x - 128.0).abs() < 1e-9);
/// assert!((win.y - 128.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct Projector {
    projection: Box<dyn Projection>,
    model_view_transform: Arc<dyn ModelViewTransform>,
    params: ProjectorParams,
    /// Pixels per radian at the center of the viewport disk.
    pixel_per_rad: f64,
    one_over_z_near_minus_far: f64,
    initialized: bool,
}

impl Projector {
    /// Creates a stale projector; call [`init`](Projector::init) before
    /// projecting.
    pub fn new(
        projection: Box<dyn Projection>,
        model_view_transform: Arc<dyn ModelViewTransform>,
    ) -> Self {
        Projector {
            projection,
            model_view_transform,
            params: ProjectorParams::default(),
            pixel_per_rad: 0.0,
            one_over_z_near_minus_far: 0.0,
            initialized: false,
        }
    }

    /// Validates `params`, stores them and recomputes the derived scale
    /// factors, transitioning the projector to the initialized state.
    ///
    /// The owning orchestrator calls this once after construction and again
    /// after any parameter change (viewport resize, FOV change, clip plane
    /// change).
    ///
    /// # Errors
    ///
    /// * [`ProjectorError::ViewportMustBePositive`]
    /// * [`ProjectorError::FovOutOfRange`] if `fov` is not in
    ///   `(0, max_fov]` for the projection family in use
    /// * [`ProjectorError::FovDiameterMustBePositive`]
    /// * [`ProjectorError::DegenerateClipPlanes`]
    pub fn init(&mut self, params: ProjectorParams) -> Result<(), ProjectorError> {
        validation::validate_params(&params, self.projection.max_fov())?;

        let half_fov_rad = (0.5 * params.fov).to_radians();
        let vsf = self.projection.fov_to_view_scaling_factor(half_fov_rad);
        self.pixel_per_rad = 0.5 * params.viewport_fov_diameter / vsf;
        self.one_over_z_near_minus_far = 1.0 / (params.z_near - params.z_far);
        self.params = params;
        self.initialized = true;

        debug!(
            "initialized {} projector: fov {}°, {} pixel/rad",
            self.projection.name(),
            self.params.fov,
            self.pixel_per_rad
        );
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), ProjectorError> {
        if !self.initialized {
            return Err(ProjectorError::NotInitialized);
        }
        Ok(())
    }

    /// Projects the vector `v` from the current frame into the viewport.
    ///
    /// On success the result holds the window coordinate in screen pixels in
    /// `x`/`y` and the clip-range-mapped depth of the original vector in `z`.
    ///
    /// # Errors
    ///
    /// * [`ProjectorError::NotInitialized`] if [`init`](Projector::init) has
    ///   not run
    /// * [`ProjectorError::DirectionNotProjectable`] if `v` has no valid
    ///   image under the current projection
    pub fn project(&self, v: &Vector3<f64>) -> Result<Vector3<f64>, ProjectorError> {
        let mut win = *v;
        self.project_in_place(&mut win)?;
        Ok(win)
    }

    /// Projects the vector `v` in place; see [`project`](Projector::project).
    pub fn project_in_place(&self, v: &mut Vector3<f64>) -> Result<(), ProjectorError> {
        self.ensure_initialized()?;

        self.model_view_transform.forward(v);
        if !self.projection.forward(v) {
            return Err(ProjectorError::DirectionNotProjectable);
        }
        v.x = self.params.viewport_center.x + self.pixel_per_rad * v.x;
        v.y = self.params.viewport_center.y + self.pixel_per_rad * v.y;
        v.z = (v.z - self.params.z_near) * self.one_over_z_near_minus_far;
        Ok(())
    }

    /// Unprojects the window coordinate `win` back into a direction in the
    /// current frame. `win.x`/`win.y` are in screen pixels; `win.z` is
    /// unused.
    ///
    /// # Errors
    ///
    /// * [`ProjectorError::NotInitialized`] if [`init`](Projector::init) has
    ///   not run
    /// * [`ProjectorError::PointNotUnprojectable`] if the window coordinate
    ///   is outside the projection's invertible range
    pub fn unproject(&self, win: &Vector3<f64>) -> Result<Vector3<f64>, ProjectorError> {
        self.unproject_xy(win.x, win.y)
    }

    /// Unprojects the window coordinate `(x, y)`; see
    /// [`unproject`](Projector::unproject).
    pub fn unproject_xy(&self, x: f64, y: f64) -> Result<Vector3<f64>, ProjectorError> {
        self.ensure_initialized()?;

        let mut v = Vector3::new(
            (x - self.params.viewport_center.x) / self.pixel_per_rad,
            (y - self.params.viewport_center.y) / self.pixel_per_rad,
            0.0,
        );
        if !self.projection.backward(&mut v) {
            return Err(ProjectorError::PointNotUnprojectable);
        }
        self.model_view_transform.backward(&mut v);
        Ok(v)
    }

    /// Whether a projected window coordinate lies inside the viewport
    /// rectangle.
    pub fn check_in_viewport(&self, win: &Vector3<f64>) -> bool {
        let vp = &self.params.viewport;
        win.x >= vp.x as f64
            && win.y >= vp.y as f64
            && win.x < (vp.x + vp.width as i32) as f64
            && win.y < (vp.y + vp.height as i32) as f64
    }

    /// The current projection matrix: a 2D orthographic map from the
    /// viewport rectangle to normalized device coordinates, for upload to
    /// the GPU pipeline.
    ///
    /// The nonlinear projection itself runs on the per-vector CPU path, so
    /// the GPU side only needs this linear viewport map.
    pub fn projection_matrix(&self) -> Matrix4<f64> {
        let vp = &self.params.viewport;
        let (x, y) = (vp.x as f64, vp.y as f64);
        let (w, h) = (vp.width as f64, vp.height as f64);
        Matrix4::new(
            2.0 / w, 0.0, 0.0, -(2.0 * x + w) / w,
            0.0, 2.0 / h, 0.0, -(2.0 * y + h) / h,
            0.0, 0.0, -1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// The lower-left corner of the viewport and its width, height.
    ///
    /// Viewport accessors are valid on a stale projector; only the
    /// per-vector calls and [`fov`](Projector::fov) require
    /// [`init`](Projector::init) to have run.
    pub fn viewport(&self) -> &Viewport {
        &self.params.viewport
    }

    /// The viewport center in screen pixels.
    pub fn viewport_center(&self) -> Vector2<f64> {
        self.params.viewport_center
    }

    /// The horizontal viewport offset in pixels.
    pub fn viewport_pos_x(&self) -> i32 {
        self.params.viewport.x
    }

    /// The vertical viewport offset in pixels.
    pub fn viewport_pos_y(&self) -> i32 {
        self.params.viewport.y
    }

    /// The viewport width in pixels.
    pub fn viewport_width(&self) -> u32 {
        self.params.viewport.width
    }

    /// The viewport height in pixels.
    pub fn viewport_height(&self) -> u32 {
        self.params.viewport.height
    }

    /// The current FOV disk diameter in degrees, as stored by the last
    /// [`init`](Projector::init).
    pub fn fov(&self) -> f64 {
        self.params.fov
    }

    /// The maximum FOV disk diameter in degrees supported by the projection
    /// family in use.
    pub fn max_fov(&self) -> f64 {
        self.projection.max_fov()
    }

    /// The small zoom increment to use at the given FOV for nice movements;
    /// see [`Projection::delta_zoom`].
    pub fn delta_zoom(&self, fov: f64) -> f64 {
        self.projection.delta_zoom(fov)
    }

    /// Pixels per radian at the center of the viewport disk.
    pub fn pixel_per_rad(&self) -> f64 {
        self.pixel_per_rad
    }

    /// The parameters stored by the last [`init`](Projector::init).
    pub fn params(&self) -> &ProjectorParams {
        &self.params
    }

    /// The current model-view transform.
    pub fn model_view_transform(&self) -> &Arc<dyn ModelViewTransform> {
        &self.model_view_transform
    }

    /// Replaces the model-view transform. The derived scale factors do not
    /// depend on it, so this does not stale the projector.
    pub fn set_model_view_transform(&mut self, transform: Arc<dyn ModelViewTransform>) {
        self.model_view_transform = transform;
    }
}
