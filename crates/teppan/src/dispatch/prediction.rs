use serde::Serialize;
use crate::error::{AdmissionError, ResourceError};

/// Index and value of the first maximum, or `None` for an empty slice.
///
/// Ties go to the lowest index. NaN never compares greater, so it only wins
/// when it is the first element and nothing after it is larger.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let (&first, rest) = values.split_first()?;
    let mut best = (0, first);
    for (offset, &value) in rest.iter().enumerate() {
        if value > best.1 {
            best = (offset + 1, value);
        }
    }
    Some(best)
}

/// A classified output vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    top_index: usize,
    top_score: f32,
    probs: Vec<f32>,
}

impl Prediction {
    /// Validates a raw output vector against the mounted class count and
    /// picks the top class.
    ///
    /// # Errors
    ///
    /// [`ResourceError::EmptyOutput`] or [`ResourceError::OutputLength`]
    pub fn from_output(output: Vec<f32>, classes: usize) -> Result<Self, ResourceError> {
        if output.len() != classes {
            return Err(ResourceError::OutputLength { expected: classes, got: output.len() });
        }
        let (top_index, top_score) = argmax(&output).ok_or(ResourceError::EmptyOutput)?;
        Ok(Self { top_index, top_score, probs: output })
    }

    pub fn top_index(&self) -> usize {
        self.top_index
    }

    pub fn top_score(&self) -> f32 {
        self.top_score
    }

    pub fn probs(&self) -> &[f32] {
        &self.probs
    }
}

/// What happened to one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The resource answered with a valid output vector
    Completed(Prediction),

    /// The request was admitted but the resource failed it
    Failed { error: ResourceError },

    /// The request never got a permit
    NotAdmitted { reason: AdmissionError },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Outcome::Completed(prediction) => Some(prediction),
            _ => None,
        }
    }
}

impl From<Result<Prediction, ResourceError>> for Outcome {
    fn from(result: Result<Prediction, ResourceError>) -> Self {
        match result {
            Ok(prediction) => Outcome::Completed(prediction),
            Err(error) => Outcome::Failed { error },
        }
    }
}
