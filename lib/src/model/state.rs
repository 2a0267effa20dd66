/// Marker for a model that is still being trained.
///
/// `Model<B, Unfitted>` implements [`TrainableModel`](super::TrainableModel)
/// and cannot be used for prediction.
#[derive(Debug, Clone, Copy)]
pub struct Unfitted;

/// Marker for a trained model.
///
/// `Model<B, Fitted>` implements [`InferenceModel`](super::InferenceModel)
/// and holds inference parameters only.
#[derive(Debug, Clone, Copy)]
pub struct Fitted;
