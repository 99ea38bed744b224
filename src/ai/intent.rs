use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::client::{ClassifierAdapter, ClassifierError, CompletionRequest};
use super::json::first_json_object;
use crate::db::enums::Intent;

const INTENT_PROMPT: &str = r#"Eres un detector de intención de mensajes. Clasifica el mensaje del usuario en exactamente una de estas intenciones:
  • thought     → registra datos sobre la vida del usuario o cualquier experiencia, para recordarlo con facilidad.
  • list        → el mensaje solicita o modifica una lista (añadir o eliminar ítems, tareas, compras, etc.).
  • research    → el mensaje pide investigar un tema y recopilar información (definiciones, datos, estudios).
  • drive_query → el mensaje pregunta por documentos o libros guardados en Google Drive.
  • order       → el mensaje es una orden directa al asistente que no crea ningún registro.

Responde SÓLO con JSON válido en este formato exacto:
{"intent":"<thought|list|research|drive_query|order>"}"#;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Classifier unavailable: {0}")]
    Adapter(#[from] ClassifierError),
    #[error("Classifier reply has no JSON object")]
    NoJson,
    #[error("Classifier reply is malformed: {0}")]
    Malformed(String),
    #[error("Unknown intent token: {0}")]
    UnknownIntent(String),
}

#[derive(Deserialize)]
struct IntentReply {
    intent: String,
}

/// Labels a message with one of the classifiable intents. `classify` never
/// fails; anything unusable becomes [`Intent::Thought`].
#[derive(Clone)]
pub struct IntentClassifier {
    adapter: Arc<dyn ClassifierAdapter>,
}

impl IntentClassifier {
    pub fn new(adapter: Arc<dyn ClassifierAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn try_classify(
        &self,
        sender: &str,
        content: &str,
    ) -> Result<Intent, ClassificationError> {
        let request = CompletionRequest::instruction(INTENT_PROMPT)
            .with_user(content)
            .max_tokens(20)
            .temperature(0.0);
        let reply = self.adapter.complete(&request).await?;

        let region = first_json_object(&reply).ok_or(ClassificationError::NoJson)?;
        let parsed: IntentReply = serde_json::from_str(region)
            .map_err(|e| ClassificationError::Malformed(e.to_string()))?;

        let intent = parsed
            .intent
            .parse::<Intent>()
            .map_err(|_| ClassificationError::UnknownIntent(parsed.intent.clone()))?;
        debug!(sender, %intent, "Message classified.");
        Ok(intent)
    }

    pub async fn classify(&self, sender: &str, content: &str) -> Intent {
        self.try_classify(sender, content).await.unwrap_or_else(|e| {
            warn!(sender, error = %e, "Classification failed, defaulting to thought.");
            Intent::default()
        })
    }
}
