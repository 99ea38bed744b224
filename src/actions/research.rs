use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{prefix_chars, require, ActionContext, ActionError};
use crate::ai::client::CompletionRequest;
use crate::db::enums::Intent;
use crate::db::models::{Note, ResolvedTags};
use crate::dispatch::router::ActionPayload;

const AI_AUTHOR: &str = "AI";
const SOURCE_TYPE: &str = "research";

/// Asks the model for a short report and stores it as a note.
pub async fn perform_research(ctx: &ActionContext, payload: &ActionPayload) -> Result<Note, ActionError> {
    let user_id = require(&payload.user_id, "userId")?;
    let topic = require(&payload.content, "content")?;

    let prompt = format!(
        "Eres un asistente de investigación académica. Para el tema siguiente, genera\n\
         un informe estructurado que incluya:\n\
         \x20 1. Resumen breve\n\
         \x20 2. Puntos clave en viñetas\n\
         \x20 3. Referencias o fuentes (si las conoces)\n\
         Tema: \"{topic}\""
    );
    let request = CompletionRequest::instruction(prompt)
        .max_tokens(500)
        .temperature(0.7);
    let report = ctx.adapter.complete(&request).await?.trim().to_string();
    if report.is_empty() {
        return Err(ActionError::EmptyCompletion);
    }

    let now = Utc::now();
    let note = Note {
        note_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        title: format!("Investigación: {}...", prefix_chars(topic, 30)),
        content: report,
        attachment_keys: Vec::new(),
        tags: ResolvedTags::default(),
        tag_source: None,
        source_type: Some(SOURCE_TYPE.to_string()),
        source_message_id: payload.source_message_id,
        source_conversation_id: payload.conversation_id.clone(),
        created_at: now,
        updated_at: now,
        created_by: AI_AUTHOR.to_string(),
        last_modified_by: AI_AUTHOR.to_string(),
    };
    ctx.stores.notes.put_note(note.clone()).await?;
    info!(user_id, note_id = %note.note_id, "Research note created.");

    let confirmation = confirmation_text(ctx, &note, topic).await;
    ctx.conversation
        .confirm(payload.reply_conversation(), &confirmation, Intent::Research)
        .await;
    Ok(note)
}

async fn confirmation_text(ctx: &ActionContext, note: &Note, topic: &str) -> String {
    let fallback = format!(
        "Completé la investigación sobre \"{}\". La guardé como nota, puedes revisarla ahí. 📝",
        prefix_chars(topic, 50)
    );
    let prompt = format!(
        "Eres Zafira, un asistente personal. El usuario te pidió investigar un tema y completaste la investigación.\n\n\
         Tema solicitado: \"{}\"\n\
         Título de la nota creada: \"{}\"\n\
         Resumen breve del resultado: \"{}\"\n\n\
         Genera una respuesta breve y natural (2-3 oraciones) confirmando que completaste la investigación \
         y la guardaste como nota. Menciona algún hallazgo interesante. Responde en español.",
        prefix_chars(topic, 200),
        note.title,
        prefix_chars(&note.content, 300),
    );
    let request = CompletionRequest::instruction(prompt)
        .max_tokens(200)
        .temperature(0.7);
    match ctx.adapter.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback,
        Err(e) => {
            warn!(note_id = %note.note_id, error = %e, "Research confirmation completion failed.");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::store::{MessageStore, NoteStore};
    use crate::dispatch::router::ASSISTANT_AUTHOR;
    use crate::test_support::{action_context, ScriptedClassifier};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_creates_note_with_truncated_title() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Ok("  1. Resumen: la fotosíntesis convierte luz en energía.  ".to_string()),
            Ok("".to_string()),
        ]));
        let ctx = action_context(store.clone(), classifier);
        let topic = "investiga cómo funciona la fotosíntesis en las plantas";
        let payload = ActionPayload::new("u1", topic, ASSISTANT_AUTHOR);

        let note = perform_research(&ctx, &payload).await.unwrap();
        assert_eq!(note.title, "Investigación: investiga cómo funciona la fot...");
        assert!(note.content.starts_with("1. Resumen"));
        assert_eq!(note.source_type.as_deref(), Some("research"));
        assert!(note.tags.is_empty());
        assert!(note.tag_source.is_none());
        assert_eq!(store.list_notes("u1").await.unwrap().len(), 1);

        let messages = store.list_messages("u1").await.unwrap();
        assert_eq!(messages[0].intent, Some(Intent::Research));
        assert!(messages[0].content.starts_with("Completé la investigación"));
    }

    #[tokio::test]
    async fn test_empty_report_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(vec![Ok("   ".to_string())]));
        let ctx = action_context(store.clone(), classifier);
        let payload = ActionPayload::new("u1", "tema", ASSISTANT_AUTHOR);

        let result = perform_research(&ctx, &payload).await;
        assert!(matches!(result, Err(ActionError::EmptyCompletion)));
        assert!(store.list_notes("u1").await.unwrap().is_empty());
    }
}
