use serde::Serialize;

/// Probabilities at or above this are labelled `Cancerous`.
pub const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    #[serde(rename = "Cancerous")]
    Cancerous,
    #[serde(rename = "Non-Cancerous")]
    NonCancerous,
}

impl Label {
    pub fn from_probability(probability: f32) -> Self {
        if probability >= DECISION_THRESHOLD {
            Label::Cancerous
        } else {
            Label::NonCancerous
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: Label,
    pub confidence: f32,
}

impl PredictionResponse {
    pub fn from_probability(probability: f32) -> Self {
        PredictionResponse {
            prediction: Label::from_probability(probability),
            confidence: probability,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}
