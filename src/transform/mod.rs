//! Model-view transforms applied to sky directions before projection.
//!
//! A [`ModelViewTransform`] maps a direction vector from an external reference
//! frame (e.g. equatorial J2000) into the observer's view frame. The trait is
//! deliberately open: most transforms are a single 4x4 matrix
//! ([`Mat4Transform`]), but refraction-style corrections are nonlinear and
//! still have to compose with the rest of the pipeline.

use std::fmt;

use nalgebra::{Matrix4, Vector3};

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("Transform matrix is singular and cannot be inverted")]
    SingularMatrix,
}

/// A transform between an external reference frame and the observer's view
/// frame.
///
/// `forward` and `backward` must be exact algebraic inverses for the same
/// transform state: `backward(forward(v))` recovers `v` up to floating
/// rounding. Implementations must be cheap to call per vector; the projector
/// invokes them on the hot path for every projected object.
pub trait ModelViewTransform: fmt::Debug + Send + Sync {
    /// Transform `v` in place from the reference frame into the view frame.
    fn forward(&self, v: &mut Vector3<f64>);

    /// Inverse of [`forward`](Self::forward), in place.
    fn backward(&self, v: &mut Vector3<f64>);

    /// Incorporate an additional 4x4 transform into this one by
    /// right-multiplication: the combined transform applies `m` first, then
    /// the existing transform.
    fn combine(&mut self, m: &Matrix4<f64>) -> Result<(), TransformError>;

    /// Return an independent deep copy.
    ///
    /// Projectors used for separate sub-viewports or on separate threads must
    /// not alias mutable transform state; they clone at the point where they
    /// need to diverge.
    fn clone_boxed(&self) -> Box<dyn ModelViewTransform>;

    /// The equivalent 4x4 matrix, for GPU-side transform upload.
    ///
    /// For a genuinely nonlinear transform this is a linear approximation and
    /// the implementation must document which one it returns.
    fn transform_matrix(&self) -> Matrix4<f64>;
}

/// A [`ModelViewTransform`] backed by a single 4x4 matrix.
///
/// The inverse is computed once at construction (and on every
/// [`combine`](ModelViewTransform::combine)) so that `backward` stays a plain
/// matrix application on the hot path.
#[derive(Debug, Clone)]
pub struct Mat4Transform {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl Mat4Transform {
    /// Creates a transform from an invertible 4x4 matrix.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::SingularMatrix`] if `matrix` has no inverse.
    pub fn new(matrix: Matrix4<f64>) -> Result<Self, TransformError> {
        let inverse = matrix
            .try_inverse()
            .ok_or(TransformError::SingularMatrix)?;
        Ok(Mat4Transform { matrix, inverse })
    }

    /// The identity transform, leaving every direction unchanged.
    pub fn identity() -> Self {
        Mat4Transform {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }
}

impl ModelViewTransform for Mat4Transform {
    fn forward(&self, v: &mut Vector3<f64>) {
        // Homogeneous application with implicit w = 1, so matrices carrying a
        // translation part behave like the equivalent affine transform.
        *v = (self.matrix * v.push(1.0)).xyz();
    }

    fn backward(&self, v: &mut Vector3<f64>) {
        *v = (self.inverse * v.push(1.0)).xyz();
    }

    fn combine(&mut self, m: &Matrix4<f64>) -> Result<(), TransformError> {
        let m_inverse = m.try_inverse().ok_or(TransformError::SingularMatrix)?;
        self.matrix = self.matrix * m;
        // (T * M)^-1 = M^-1 * T^-1
        self.inverse = m_inverse * self.inverse;
        Ok(())
    }

    fn clone_boxed(&self) -> Box<dyn ModelViewTransform> {
        Box::new(self.clone())
    }

    fn transform_matrix(&self) -> Matrix4<f64> {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn rotation_z(angle: f64) -> Matrix4<f64> {
        Matrix4::new_rotation(Vector3::z() * angle)
    }

    #[test]
    fn test_forward_backward_round_trip() {
        let matrix = rotation_z(0.7) * Matrix4::new_translation(&Vector3::new(0.1, 0.0, -0.3));
        let transform = Mat4Transform::new(matrix).unwrap();

        let original = Vector3::new(0.3, -1.2, 0.5);
        let mut v = original;
        transform.forward(&mut v);
        transform.backward(&mut v);

        assert_relative_eq!(v, original, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_applies_rotation() {
        let transform = Mat4Transform::new(rotation_z(FRAC_PI_2)).unwrap();

        // A quarter turn around z maps +x onto +y.
        let mut v = Vector3::new(1.0, 0.0, 0.0);
        transform.forward(&mut v);

        assert_relative_eq!(v, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let result = Mat4Transform::new(Matrix4::zeros());
        assert!(matches!(result, Err(TransformError::SingularMatrix)));
    }

    #[test]
    fn test_combine_applies_new_matrix_first() {
        let first = rotation_z(0.4);
        let second = rotation_z(1.1);

        let mut combined = Mat4Transform::new(second).unwrap();
        combined.combine(&first).unwrap();

        // combined = second * first, so vectors see `first` before `second`.
        let mut v = Vector3::new(0.8, -0.1, 0.3);
        let mut expected = v;
        Mat4Transform::new(first).unwrap().forward(&mut expected);
        Mat4Transform::new(second).unwrap().forward(&mut expected);
        combined.forward(&mut v);

        assert_relative_eq!(v, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_keeps_inverse_in_sync() {
        let mut transform = Mat4Transform::new(rotation_z(0.9)).unwrap();
        transform
            .combine(&Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let original = Vector3::new(-0.4, 0.6, 1.5);
        let mut v = original;
        transform.forward(&mut v);
        transform.backward(&mut v);

        assert_relative_eq!(v, original, epsilon = 1e-12);
    }

    #[test]
    fn test_clone_independence() {
        let transform = Mat4Transform::new(rotation_z(0.25)).unwrap();
        let before = transform.transform_matrix();

        let mut clone = transform.clone_boxed();
        clone.combine(&rotation_z(1.3)).unwrap();

        assert_relative_eq!(transform.transform_matrix(), before, epsilon = 1e-15);
        assert!(clone.transform_matrix() != before);
    }
}
