//! Category string to label encoding.
//!
//! Matching is plain substring containment with no case or whitespace
//! normalisation: a class name contained in another class name (`forest` in
//! `mixed-forest`) matches both.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::manifest::ManifestRow;

/// Multi-hot vector of length `vocabulary.len()`; entry `i` is 1 iff
/// `vocabulary[i]` occurs in `category`.
pub fn encode_multilabel<S: AsRef<str>>(category: &str, vocabulary: &[S]) -> Vec<f64> {
    vocabulary
        .iter()
        .map(|class| if category.contains(class.as_ref()) { 1.0 } else { 0.0 })
        .collect()
}

/// 1 iff `task` occurs in `category`.
pub fn encode_binary(category: &str, task: &str) -> f64 {
    if category.contains(task) {
        1.0
    } else {
        0.0
    }
}

/// Label attached to a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    /// Single-task presence, 0 or 1
    Binary(f64),
    /// One entry per vocabulary class
    MultiHot(Vec<f64>),
}

impl Label {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Label::Binary(value) => std::slice::from_ref(value),
            Label::MultiHot(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Positions holding a 1
    pub fn positives(&self) -> impl Iterator<Item = usize> + '_ {
        self.as_slice()
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.5)
            .map(|(i, _)| i)
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.as_slice().iter().map(|&v| v as f32).collect()
    }
}

type LabelFn = dyn Fn(&ManifestRow) -> Label + Send + Sync;

/// Derives a label from a manifest row; injected into the dataset at
/// construction.
#[derive(Clone)]
pub struct LabelStrategy {
    name: String,
    width: usize,
    label_fn: Arc<LabelFn>,
}

impl LabelStrategy {
    /// Multi-hot labels over `vocabulary`, in vocabulary order
    pub fn multilabel(vocabulary: Vec<String>) -> Self {
        let width = vocabulary.len();
        Self {
            name: "multilabel".to_string(),
            width,
            label_fn: Arc::new(move |row: &ManifestRow| {
                Label::MultiHot(encode_multilabel(&row.category, vocabulary.as_slice()))
            }),
        }
    }

    /// Binary presence of a single task class
    pub fn binary(task: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            name: format!("binary:{task}"),
            width: 1,
            label_fn: Arc::new(move |row: &ManifestRow| {
                Label::Binary(encode_binary(&row.category, &task))
            }),
        }
    }

    /// Arbitrary strategy; every label it produces must have length `width`
    pub fn custom<F>(name: impl Into<String>, width: usize, label_fn: F) -> Self
    where
        F: Fn(&ManifestRow) -> Label + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            width,
            label_fn: Arc::new(label_fn),
        }
    }

    pub fn label(&self, row: &ManifestRow) -> Label {
        (self.label_fn)(row)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LabelStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelStrategy")
            .field("name", &self.name)
            .field("width", &self.width)
            .finish()
    }
}
