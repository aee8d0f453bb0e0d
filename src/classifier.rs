use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tract_onnx::prelude::*;

use crate::preprocess::{tensor_shape, ImageTensor};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model from {path}: {cause}")]
    Load { path: PathBuf, cause: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model produced an empty output")]
    EmptyOutput,
}

/// A binary classifier: image tensor in, probability of the positive class out.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: ImageTensor) -> Result<f32, ClassifierError>;
}

/// Shared, read-only handle. `None` when loading failed at startup.
pub type ModelHandle = Option<Arc<dyn Classifier>>;

pub struct OnnxClassifier {
    plan: OnnxPlan,
}

impl OnnxClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let load_err = |e: TractError| ClassifierError::Load {
            path: path.to_path_buf(),
            cause: format!("{e:#}"),
        };

        let (n, h, w, c) = tensor_shape();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(0, f32::fact([n, h, w, c]).into())
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?
            .into_runnable()
            .map_err(load_err)?;

        Ok(OnnxClassifier { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: ImageTensor) -> Result<f32, ClassifierError> {
        let tensor: Tensor = input.into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::Inference(format!("{e:#}")))?;

        first_probability(&outputs)
    }
}

/// The probability is the first scalar of the first output.
fn first_probability(outputs: &[TValue]) -> Result<f32, ClassifierError> {
    let output = outputs.first().ok_or(ClassifierError::EmptyOutput)?;
    let view = output
        .to_array_view::<f32>()
        .map_err(|e| ClassifierError::Inference(format!("{e:#}")))?;

    view.iter().next().copied().ok_or(ClassifierError::EmptyOutput)
}

/// Loads the model once at startup. A failure is logged and yields an
/// absent handle so the server can still answer with "Model not loaded".
pub fn load_model(path: &Path) -> ModelHandle {
    match OnnxClassifier::load(path) {
        Ok(model) => {
            log::info!("model loaded from {}", path.display());
            Some(Arc::new(model))
        }
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}
