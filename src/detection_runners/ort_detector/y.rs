use anyhow::{bail, Result};
use ndarray::{Array3, ArrayView2, Axis};
use crate::common::BvrInstance;

/// Container for the inference result of one image.
///
/// # Fields
///
/// * `instances` - Detected instances, highest score first.
/// * `masks` - Boolean masks laid out as `(height, width, instance)`, one plane per entry of
///   `instances`.
#[derive(Clone, PartialEq, Default)]
pub struct Y {
    instances: Vec<BvrInstance>,
    masks: Array3<bool>,
}

impl std::fmt::Debug for Y {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("Y");
        if !self.instances.is_empty() {
            f.field("Instances", &self.instances);
        }
        f.field("MaskShape", &self.masks.shape());
        f.finish()
    }
}

impl Y {
    /// An empty result for a `width` x `height` frame.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            instances: vec![],
            masks: Array3::from_elem((height as usize, width as usize, 0), false),
        }
    }

    /// Sets instances and their masks together.
    ///
    /// # Returns
    ///
    /// * `Result<Self>` - An error if the number of mask planes differs from the number of instances.
    pub fn with_instances(mut self, instances: Vec<BvrInstance>, masks: Array3<bool>) -> Result<Self> {
        if masks.len_of(Axis(2)) != instances.len() {
            bail!(
                "Mask array holds {} instances but {} instances were given",
                masks.len_of(Axis(2)),
                instances.len()
            );
        }
        self.instances = instances;
        self.masks = masks;
        Ok(self)
    }

    pub fn instances(&self) -> &[BvrInstance] {
        &self.instances
    }

    pub fn masks(&self) -> &Array3<bool> {
        &self.masks
    }

    pub fn mask(&self, i: usize) -> Option<ArrayView2<bool>> {
        if i < self.len() {
            Some(self.masks.index_axis(Axis(2), i))
        } else {
            None
        }
    }

    pub fn scores(&self) -> Vec<f32> {
        self.instances.iter().map(|x| x.confidence).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn into_parts(self) -> (Vec<BvrInstance>, Array3<bool>) {
        (self.instances, self.masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_and_mask_counts_must_match() {
        let masks = Array3::from_elem((4, 6, 2), false);
        assert!(Y::empty(6, 4).with_instances(vec![BvrInstance::default()], masks.clone()).is_err());

        let y = Y::empty(6, 4)
            .with_instances(vec![BvrInstance::default(), BvrInstance::default()], masks)
            .unwrap();
        assert_eq!(y.len(), 2);
        assert_eq!(y.mask(1).unwrap().dim(), (4, 6));
        assert!(y.mask(2).is_none());
    }

    #[test]
    fn empty_keeps_frame_shape() {
        let y = Y::empty(6, 4);
        assert!(y.is_empty());
        assert_eq!(y.masks().dim(), (4, 6, 0));
    }
}
