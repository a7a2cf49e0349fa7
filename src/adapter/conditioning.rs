//! Class-conditioning policy for conditional generators

use candle_core::{Device, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label reserved for "no class" when driving conditional architectures
/// unconditionally
pub const NO_CLASS: u32 = 0;

const NO_CLASS_SET: &[u32] = &[NO_CLASS];

/// Classes requested by a caller: one identifier or an ordered collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassSelection {
    /// A single class
    Single(u32),
    /// Several classes to mix
    Many(Vec<u32>),
}

impl ClassSelection {
    /// Collections must be non-empty
    pub fn validate(&self) -> Result<()> {
        match self {
            ClassSelection::Many(classes) if classes.is_empty() => {
                Err(Error::invalid_input("class selection must not be empty"))
            }
            _ => Ok(()),
        }
    }

    fn into_classes(self) -> Result<Vec<u32>> {
        self.validate()?;
        Ok(match self {
            ClassSelection::Single(class) => vec![class],
            ClassSelection::Many(classes) => classes,
        })
    }
}

impl From<u32> for ClassSelection {
    fn from(class: u32) -> Self {
        ClassSelection::Single(class)
    }
}

impl From<Vec<u32>> for ClassSelection {
    fn from(classes: Vec<u32>) -> Self {
        ClassSelection::Many(classes)
    }
}

impl From<&[u32]> for ClassSelection {
    fn from(classes: &[u32]) -> Self {
        ClassSelection::Many(classes.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for ClassSelection {
    fn from(classes: [u32; N]) -> Self {
        ClassSelection::Many(classes.to_vec())
    }
}

/// Decides which labels accompany a batch when the caller supplies none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditioningPolicy {
    /// Sample from an ordered, non-empty class set
    Classes(Vec<u32>),
    /// Always emit [`NO_CLASS`]
    NoClass,
}

impl ConditioningPolicy {
    /// Policy over the given classes
    pub fn new(selection: impl Into<ClassSelection>) -> Result<Self> {
        Ok(ConditioningPolicy::Classes(selection.into().into_classes()?))
    }

    /// Degenerate policy for unconditional use
    pub fn no_class() -> Self {
        ConditioningPolicy::NoClass
    }

    /// Replace the active class set. Identifiers are not checked against the
    /// generator's vocabulary here.
    pub fn configure(&mut self, selection: impl Into<ClassSelection>) -> Result<()> {
        let classes = selection.into().into_classes()?;
        *self = ConditioningPolicy::Classes(classes);
        Ok(())
    }

    /// Active class set
    pub fn classes(&self) -> &[u32] {
        match self {
            ConditioningPolicy::Classes(classes) => classes,
            ConditioningPolicy::NoClass => NO_CLASS_SET,
        }
    }

    /// Whether labels are drawn at random
    pub fn is_mixed(&self) -> bool {
        self.classes().len() > 1
    }

    /// Labels for a batch, drawn from the thread-local RNG
    pub fn sample_labels(&self, batch_size: usize) -> Vec<u32> {
        self.sample_labels_with(batch_size, &mut rand::rng())
    }

    /// Labels for a batch: one active class is repeated, several are drawn
    /// uniformly with replacement.
    pub fn sample_labels_with<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<u32> {
        let classes = self.classes();
        if classes.len() == 1 {
            return vec![classes[0]; batch_size];
        }
        (0..batch_size)
            .map(|_| classes[rng.random_range(0..classes.len())])
            .collect()
    }

    /// Sampled labels as a `[batch]` `u32` tensor on `device`
    pub fn label_tensor(&self, batch_size: usize, device: &Device) -> Result<Tensor> {
        let labels = self.sample_labels(batch_size);
        Ok(Tensor::from_vec(labels, batch_size, device)?)
    }
}
