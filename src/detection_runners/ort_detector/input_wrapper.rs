use anyhow::Result;
use ndarray::{Array, Axis, IxDyn};

/// Model input, wrapper over [`Array<f32, IxDyn>`]
#[derive(Debug, Clone, Default)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl X {
    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    /// Adds a leading batch axis, `(C, H, W)` to `(1, C, H, W)`.
    pub fn insert_batch_axis(self) -> Self {
        Self(self.0.insert_axis(Axis(0)))
    }

    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }
}
