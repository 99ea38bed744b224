use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::{require, ActionContext, ActionError};
use crate::ai::client::CompletionRequest;
use crate::ai::json::parse_first_object;
use crate::db::enums::Intent;
use crate::dispatch::router::ActionPayload;

const NO_ANSWER: &str = "No pude generar una respuesta.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveSubIntent {
    #[default]
    ListFiles,
    GetSummary,
    SearchTopic,
    GetLink,
    Compare,
    GeneralSummary,
    Stats,
}

impl DriveSubIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveSubIntent::ListFiles => "list_files",
            DriveSubIntent::GetSummary => "get_summary",
            DriveSubIntent::SearchTopic => "search_topic",
            DriveSubIntent::GetLink => "get_link",
            DriveSubIntent::Compare => "compare",
            DriveSubIntent::GeneralSummary => "general_summary",
            DriveSubIntent::Stats => "stats",
        }
    }

    fn instruction(&self, target: Option<&str>, topic: &str) -> String {
        match self {
            DriveSubIntent::ListFiles => "Lista los libros de forma ordenada y amigable.".to_string(),
            DriveSubIntent::GetSummary => format!(
                "El usuario pregunta sobre el libro \"{}\". Responde basándote en lo que sepas del resumen.",
                target.unwrap_or(topic)
            ),
            DriveSubIntent::SearchTopic => format!(
                "El usuario busca libros sobre el tema \"{topic}\". Identifica cuáles libros hablan sobre ese tema."
            ),
            DriveSubIntent::GetLink => format!(
                "El usuario quiere el enlace del libro \"{}\".",
                target.unwrap_or(topic)
            ),
            DriveSubIntent::Compare => format!(
                "El usuario quiere comparar lo que dicen sus libros sobre \"{topic}\"."
            ),
            DriveSubIntent::GeneralSummary => {
                "El usuario quiere un resumen general de todos los libros que ha leído.".to_string()
            }
            DriveSubIntent::Stats => "Presenta las estadísticas de forma amigable.".to_string(),
        }
    }
}

impl FromStr for DriveSubIntent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "list_files" => Ok(DriveSubIntent::ListFiles),
            "get_summary" => Ok(DriveSubIntent::GetSummary),
            "search_topic" => Ok(DriveSubIntent::SearchTopic),
            "get_link" => Ok(DriveSubIntent::GetLink),
            "compare" => Ok(DriveSubIntent::Compare),
            "general_summary" => Ok(DriveSubIntent::GeneralSummary),
            "stats" => Ok(DriveSubIntent::Stats),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DriveSubIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct SubIntentReply {
    sub_intent: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveAnswer {
    pub sub_intent: DriveSubIntent,
    pub response: String,
}

/// Answers a question about the user's stored documents from the model alone
/// and posts the answer to the owner's conversation.
pub async fn answer_drive_query(
    ctx: &ActionContext,
    payload: &ActionPayload,
) -> Result<DriveAnswer, ActionError> {
    let user_id = require(&payload.user_id, "userId")?;
    let query = require(&payload.content, "content")?;

    let (sub_intent, target, topic) = classify_sub_intent(ctx, query).await;
    debug!(user_id, %sub_intent, ?target, ?topic, "Drive query classified.");
    let topic = topic.unwrap_or_else(|| query.to_string());

    let prompt = format!(
        "Eres Zafira, un asistente personal inteligente. El usuario te pregunta sobre sus resúmenes de libros guardados en Google Drive.\n\n\
         {}\n\n\
         Contexto de los documentos:\n\
         No hay documentos de Drive disponibles en esta sesión.\n\n\
         Responde de forma útil, concisa y en español. Si no tienes la información, dilo con claridad.",
        sub_intent.instruction(target.as_deref(), &topic)
    );
    let request = CompletionRequest::instruction(prompt)
        .with_user(query)
        .max_tokens(1500)
        .temperature(0.3);
    let reply = ctx.adapter.complete(&request).await?;
    let response = match reply.trim() {
        "" => NO_ANSWER.to_string(),
        text => text.to_string(),
    };

    ctx.conversation
        .post_reply(payload.reply_conversation(), &response, Intent::DriveQuery)
        .await?;
    info!(user_id, %sub_intent, "Drive query answered.");
    Ok(DriveAnswer { sub_intent, response })
}

/// Falls back to [`DriveSubIntent::ListFiles`] on any failure.
async fn classify_sub_intent(
    ctx: &ActionContext,
    query: &str,
) -> (DriveSubIntent, Option<String>, Option<String>) {
    let prompt = format!(
        "Eres un clasificador de consultas sobre documentos de Google Drive. Clasifica la consulta y responde SOLO JSON válido.\n\n\
         Sub-intents válidos:\n\
         \x20 • list_files      → listar archivos/libros disponibles\n\
         \x20 • get_summary     → obtener resumen o contenido de un libro específico\n\
         \x20 • search_topic    → buscar libros por tema o concepto\n\
         \x20 • get_link        → obtener el link/URL de un archivo\n\
         \x20 • compare         → comparar contenido entre múltiples libros\n\
         \x20 • general_summary → resumen general de todos los libros\n\
         \x20 • stats           → estadísticas (cuántos libros, fechas, etc.)\n\n\
         Si la consulta menciona un libro específico, incluye el nombre aproximado en \"target\".\n\
         Si la consulta menciona un tema, incluye el tema en \"topic\".\n\n\
         Consulta: \"{query}\"\n\
         Responde en este formato exacto:\n\
         {{\"sub_intent\":\"...\", \"target\":\"...\", \"topic\":\"...\"}}"
    );
    let request = CompletionRequest::instruction(prompt)
        .max_tokens(100)
        .temperature(0.0);

    let reply = match ctx.adapter.complete(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!(error = %e, "Drive sub-intent completion failed.");
            return (DriveSubIntent::default(), None, None);
        }
    };
    let Some(parsed) = parse_first_object::<SubIntentReply>(&reply) else {
        return (DriveSubIntent::default(), None, None);
    };

    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    (
        parsed.sub_intent.parse().unwrap_or_default(),
        non_blank(parsed.target),
        non_blank(parsed.topic),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::ClassifierError;
    use crate::db::memory::MemoryStore;
    use crate::db::store::MessageStore;
    use crate::dispatch::router::ASSISTANT_AUTHOR;
    use crate::test_support::{action_context, ScriptedClassifier};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_answers_and_persists_reply() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Ok("{\"sub_intent\":\"get_summary\", \"target\":\"Sapiens\", \"topic\":\"\"}".to_string()),
            Ok("Sapiens trata sobre la historia de la humanidad.".to_string()),
        ]));
        let ctx = action_context(store.clone(), classifier.clone());
        let payload = ActionPayload::new("u1", "¿de qué trata Sapiens?", ASSISTANT_AUTHOR);

        let answer = answer_drive_query(&ctx, &payload).await.unwrap();
        assert_eq!(answer.sub_intent, DriveSubIntent::GetSummary);

        let messages = store.list_messages("u1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].intent, Some(Intent::DriveQuery));
        assert_eq!(messages[0].content, answer.response);
        assert!(classifier.requests()[1].messages[0].content.contains("Sapiens"));
    }

    #[tokio::test]
    async fn test_unusable_sub_intent_defaults_to_list_files() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Ok("no sé".to_string()),
            Ok("".to_string()),
        ]));
        let ctx = action_context(store.clone(), classifier);
        let payload = ActionPayload::new("u1", "mis libros", ASSISTANT_AUTHOR);

        let answer = answer_drive_query(&ctx, &payload).await.unwrap();
        assert_eq!(answer.sub_intent, DriveSubIntent::ListFiles);
        assert_eq!(answer.response, NO_ANSWER);
    }

    #[tokio::test]
    async fn test_reply_failure_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Ok("{\"sub_intent\":\"stats\"}".to_string()),
            Err(ClassifierError::Timeout),
        ]));
        let ctx = action_context(store.clone(), classifier);
        let payload = ActionPayload::new("u1", "¿cuántos libros tengo?", ASSISTANT_AUTHOR);

        let result = answer_drive_query(&ctx, &payload).await;
        assert!(matches!(result, Err(ActionError::Completion(ClassifierError::Timeout))));
    }

    #[test]
    fn test_sub_intent_parsing() {
        assert_eq!("GENERAL_SUMMARY".parse::<DriveSubIntent>(), Ok(DriveSubIntent::GeneralSummary));
        assert!("other".parse::<DriveSubIntent>().is_err());
    }
}
