pub mod client;
pub mod intent;
pub mod json;

pub use client::{ClassifierAdapter, ClassifierError, CompletionRequest, OpenAiClassifier};
pub use intent::{ClassificationError, IntentClassifier};
