//! Handlers registered by the server binary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cache::field_store::CacheError;
use crate::conversation::{ConversationHandler, Context, HandlerError, HandlerRef, HandlerRegistry};

pub const ECHO: &str = "echo";
pub const COLLECT: &str = "collect";

/// Registry with every built-in handler.
pub fn default_registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .with(ECHO, EchoHandler)
        .with(COLLECT, CollectHandler)
}

/// Replies with the update's text. Stays active.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl ConversationHandler for EchoHandler {
    async fn handle(&self, ctx: Context) -> Result<Value, HandlerError> {
        Ok(json!({
            "chat_id": ctx.chat_id(),
            "text": ctx.update().text,
        }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectPayload {
    field: String,
    count: usize,
    /// Items gathered by this conversation so far.
    #[serde(default)]
    seen: usize,
}

/// Gathers the text of the next `count` updates into a chat data field,
/// then ends the conversation.
///
/// Progress is kept in the handler's own payload, so items already in the
/// field from earlier conversations do not count.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectHandler;

#[async_trait]
impl ConversationHandler for CollectHandler {
    async fn handle(&self, ctx: Context) -> Result<Value, HandlerError> {
        let mut payload: CollectPayload = serde_json::from_value(ctx.payload().clone())
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;
        if payload.count == 0 {
            return Err(HandlerError::InvalidPayload("count must be positive".into()));
        }

        let text = ctx
            .update()
            .text
            .clone()
            .ok_or_else(|| HandlerError::InvalidUpdate("update has no text".into()))?;

        let cache = ctx.cache()?;
        let chat = cache.chat(ctx.chat_id());
        chat.append_field(&payload.field, text).await?;
        payload.seen += 1;

        if payload.seen >= payload.count {
            let all: Vec<Value> = chat
                .get_field_as(&payload.field)
                .await?
                .unwrap_or_default();
            let collected = all[all.len().saturating_sub(payload.seen)..].to_vec();
            cache.delete_conversation(ctx.chat_id()).await?;
            Ok(json!({ "done": true, "collected": collected }))
        } else {
            let remaining = payload.count - payload.seen;
            let payload = serde_json::to_value(&payload).map_err(CacheError::from)?;
            let next = HandlerRef::new(COLLECT).with_payload(payload);
            cache.set_conversation_handler(ctx.chat_id(), &next).await?;
            Ok(json!({ "done": false, "remaining": remaining }))
        }
    }
}
