pub mod escalation;

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::error;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::auth::CustomerIdentity;
use crate::kb::search_knowledge_base;
use crate::llm::ChatMessage;
use crate::shared::error::AppError;
use crate::shared::models::{
    NewSupportConversation, NewSupportMessage, NewSupportTicket, SupportConversation,
    SupportMessage, SupportTicket,
};
use crate::shared::schema::{support_conversations, support_messages, support_tickets};
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;

const SUPPORT_SYSTEM_PROMPT: &str = "\
You are the marketplace's friendly AI support assistant. You help users with:
- Voucher purchases, usage, and expiration questions
- Payment and wallet issues
- Restaurant recommendations and navigation
- Account settings and profile management
- Loyalty points and rewards

Guidelines:
1. Be helpful, concise, and friendly. Use a warm, professional tone.
2. If you don't know something specific about a user's account, ask clarifying questions.
3. For payment issues, refunds, or security concerns, acknowledge you'll escalate to a human agent.
4. Support Romanian and English - respond in the same language the user uses.
5. Keep responses under 200 words unless explaining complex processes.
6. When providing steps, use numbered lists for clarity.
7. Never make up information about specific transactions or vouchers - ask for details.

Important: You cannot process refunds, modify payments, or access sensitive account data directly.
For these requests, create a support ticket for human review.";

const HISTORY_LIMIT: i64 = 10;

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
) -> Result<(StatusCode, Json<SupportConversation>), AppError> {
    let mut conn = state.conn.get()?;
    let now = Utc::now();

    let conversation: SupportConversation = diesel::insert_into(support_conversations::table)
        .values(NewSupportConversation {
            customer_id: identity.customer_id,
            status: "active".to_string(),
            channel: "chat".to_string(),
            is_handled_by_ai: true,
            created_at: now,
            updated_at: now,
        })
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
) -> Result<Json<Vec<SupportConversation>>, AppError> {
    let mut conn = state.conn.get()?;

    let conversations: Vec<SupportConversation> = support_conversations::table
        .filter(support_conversations::customer_id.eq(identity.customer_id))
        .order(support_conversations::updated_at.desc())
        .load(&mut conn)?;

    Ok(Json(conversations))
}

#[derive(Debug, serde::Serialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: SupportConversation,
    pub messages: Vec<SupportMessage>,
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
    Path(id): Path<i32>,
) -> Result<Json<ConversationWithMessages>, AppError> {
    let mut conn = state.conn.get()?;

    let conversation = load_owned_conversation(&mut conn, id, identity.customer_id)?;

    let messages: Vec<SupportMessage> = support_messages::table
        .filter(support_messages::conversation_id.eq(id))
        .order(support_messages::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(ConversationWithMessages {
        conversation,
        messages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// The chat pipeline: persist the user message, classify it, then either
/// escalate (single JSON response) or stream an LLM reply over SSE. The
/// assembled reply is persisted after the stream completes; there is no
/// abort handling for client disconnects.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
    Path(id): Path<i32>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Message content is required".to_string(),
        ));
    }

    let mut conn = state.conn.get()?;
    let conversation = load_owned_conversation(&mut conn, id, identity.customer_id)?;

    diesel::insert_into(support_messages::table)
        .values(NewSupportMessage::plain(id, "user", content.clone()))
        .execute(&mut conn)?;

    if let Some(hit) = escalation::check_escalation(&content) {
        if escalation::should_auto_ticket(&conversation.status) {
            let ticket_number = escalate_conversation(&mut conn, &conversation, &content, &hit)?;
            let message = escalation::escalation_acknowledgment(&ticket_number);
            return Ok(Json(json!({
                "message": message,
                "escalated": true,
                "ticketNumber": ticket_number,
            }))
            .into_response());
        }
    }

    let history: Vec<SupportMessage> = support_messages::table
        .filter(support_messages::conversation_id.eq(id))
        .order(support_messages::created_at.asc())
        .limit(HISTORY_LIMIT)
        .load(&mut conn)?;

    let snippets = search_knowledge_base(&mut conn, &content)?;

    let mut system_prompt = SUPPORT_SYSTEM_PROMPT.to_string();
    if !snippets.is_empty() {
        system_prompt.push_str("\n\nRelevant knowledge base articles:\n");
        system_prompt.push_str(&snippets.join("\n\n"));
    }

    let mut chat = vec![ChatMessage::system(system_prompt)];
    chat.extend(history.iter().map(|m| {
        if m.role == "user" {
            ChatMessage::user(m.content.clone())
        } else {
            ChatMessage::assistant(m.content.clone())
        }
    }));

    let (tx, mut rx) = mpsc::channel::<String>(32);
    let provider = Arc::clone(&state.llm_provider);
    let max_tokens = state.config.llm.max_tokens;
    let llm_task = tokio::spawn(async move { provider.chat_stream(&chat, max_tokens, tx).await });

    let pool = state.conn.clone();
    let model = state.config.llm.model.clone();
    let used_kb = !snippets.is_empty();
    let needs_title = conversation.title.is_none();

    let stream = async_stream::stream! {
        let mut full_response = String::new();

        while let Some(chunk) = rx.recv().await {
            full_response.push_str(&chunk);
            yield Ok::<Event, Infallible>(sse_event(json!({ "content": chunk })));
        }

        let failed = match llm_task.await {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                error!("assistant stream failed: {e}");
                true
            }
            Err(e) => {
                error!("assistant task aborted: {e}");
                true
            }
        };

        if failed {
            yield Ok(sse_event(json!({ "error": "Failed to process message" })));
            return;
        }

        if let Err(e) =
            persist_assistant_reply(&pool, id, &full_response, used_kb, &model, needs_title, &content)
        {
            error!("failed to persist assistant reply: {e}");
            yield Ok(sse_event(json!({ "error": "Failed to process message" })));
            return;
        }

        yield Ok(sse_event(json!({ "done": true })));
    };

    Ok(Sse::new(stream).into_response())
}

fn sse_event(value: serde_json::Value) -> Event {
    Event::default().data(value.to_string())
}

fn load_owned_conversation(
    conn: &mut PgConnection,
    id: i32,
    customer_id: i32,
) -> Result<SupportConversation, AppError> {
    support_conversations::table
        .filter(support_conversations::id.eq(id))
        .filter(support_conversations::customer_id.eq(customer_id))
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("Conversation"))
}

/// Creates the ticket, flips the conversation to `escalated`, and records
/// the canned acknowledgment, all in one transaction. The caller has already
/// verified the conversation is not escalated yet; a concurrent duplicate
/// message can still race that check (no unique constraint backs it).
fn escalate_conversation(
    conn: &mut PgConnection,
    conversation: &SupportConversation,
    content: &str,
    hit: &escalation::EscalationHit,
) -> Result<String, AppError> {
    let ticket_number = escalation::generate_ticket_number();
    let bundle = escalation::build_support_bundle(conn, conversation.customer_id)?;
    let now = Utc::now();

    let subject = format!("Support request: {}...", truncate_chars(content, 50));
    let acknowledgment = escalation::escalation_acknowledgment(&ticket_number);

    conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(support_tickets::table)
            .values(NewSupportTicket {
                conversation_id: Some(conversation.id),
                customer_id: conversation.customer_id,
                ticket_number: ticket_number.clone(),
                subject,
                description: content.to_string(),
                category: "general".to_string(),
                priority: "medium".to_string(),
                status: "open".to_string(),
                support_bundle: bundle,
                created_at: now,
                updated_at: now,
            })
            .execute(conn)?;

        diesel::update(
            support_conversations::table.filter(support_conversations::id.eq(conversation.id)),
        )
        .set((
            support_conversations::status.eq("escalated"),
            support_conversations::escalated_at.eq(Some(now)),
            support_conversations::escalation_reason.eq(Some(hit.reason.clone())),
            support_conversations::is_handled_by_ai.eq(false),
            support_conversations::updated_at.eq(now),
        ))
        .execute(conn)?;

        diesel::insert_into(support_messages::table)
            .values(NewSupportMessage::plain(
                conversation.id,
                "assistant",
                acknowledgment,
            ))
            .execute(conn)?;

        Ok(())
    })?;

    Ok(ticket_number)
}

fn persist_assistant_reply(
    pool: &DbPool,
    conversation_id: i32,
    full_response: &str,
    used_kb: bool,
    model: &str,
    needs_title: bool,
    user_content: &str,
) -> Result<(), AppError> {
    let mut conn = pool.get()?;
    let now = Utc::now();

    diesel::insert_into(support_messages::table)
        .values(NewSupportMessage {
            conversation_id,
            role: "assistant".to_string(),
            content: full_response.to_string(),
            rag_source_ids: used_kb.then(|| vec!["kb_search".to_string()]),
            ai_model_version: Some(model.to_string()),
            created_at: now,
        })
        .execute(&mut conn)?;

    if needs_title && !full_response.is_empty() {
        let mut title = truncate_chars(user_content, 50);
        if user_content.chars().count() > 50 {
            title.push_str("...");
        }
        diesel::update(
            support_conversations::table.filter(support_conversations::id.eq(conversation_id)),
        )
        .set(support_conversations::title.eq(Some(title)))
        .execute(&mut conn)?;
    }

    diesel::update(
        support_conversations::table.filter(support_conversations::id.eq(conversation_id)),
    )
    .set((
        support_conversations::last_message_at.eq(Some(now)),
        support_conversations::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    Ok(())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub async fn resolve_conversation(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut conn = state.conn.get()?;
    load_owned_conversation(&mut conn, id, identity.customer_id)?;

    let now = Utc::now();
    diesel::update(support_conversations::table.filter(support_conversations::id.eq(id)))
        .set((
            support_conversations::status.eq("resolved"),
            support_conversations::resolved_at.eq(Some(now)),
            support_conversations::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    identity: CustomerIdentity,
) -> Result<Json<Vec<SupportTicket>>, AppError> {
    let mut conn = state.conn.get()?;

    let tickets: Vec<SupportTicket> = support_tickets::table
        .filter(support_tickets::customer_id.eq(identity.customer_id))
        .order(support_tickets::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(tickets))
}

pub fn configure_support_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/support/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route("/support/conversations/:id", get(get_conversation))
        .route("/support/conversations/:id/messages", post(send_message))
        .route(
            "/support/conversations/:id/resolve",
            post(resolve_conversation),
        )
        .route("/support/tickets", get(list_tickets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        // Romanian diacritics are multi-byte; byte slicing would panic here.
        let s = "reclamație ".repeat(10);
        let t = truncate_chars(&s, 50);
        assert_eq!(t.chars().count(), 50);
    }

    #[test]
    fn history_roles_collapse_to_chat_roles() {
        let m = SupportMessage {
            id: 1,
            conversation_id: 1,
            role: "agent".to_string(),
            content: "hello".to_string(),
            rag_source_ids: None,
            ai_model_version: None,
            created_at: Utc::now(),
        };
        let chat = if m.role == "user" {
            ChatMessage::user(m.content.clone())
        } else {
            ChatMessage::assistant(m.content.clone())
        };
        assert_eq!(chat.role, "assistant");
    }
}
