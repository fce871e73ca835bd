use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::shared::schema::{
    knowledge_base, support_conversations, support_messages, support_tickets,
};

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = customers)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub membership_tier: String,
    pub loyalty_points: i32,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = customer_sessions)]
pub struct CustomerSession {
    pub token: String,
    pub customer_id: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = restaurants)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub cuisine: String,
    pub price_range: String,
    pub rating: BigDecimal,
    pub review_count: i32,
    pub is_popular: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = support_conversations)]
#[serde(rename_all = "camelCase")]
pub struct SupportConversation {
    pub id: i32,
    pub customer_id: i32,
    pub title: Option<String>,
    pub status: String,
    pub channel: String,
    pub is_handled_by_ai: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = support_conversations)]
pub struct NewSupportConversation {
    pub customer_id: i32,
    pub status: String,
    pub channel: String,
    pub is_handled_by_ai: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = support_messages)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    pub id: i32,
    pub conversation_id: i32,
    pub role: String,
    pub content: String,
    pub rag_source_ids: Option<Vec<String>>,
    pub ai_model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = support_messages)]
pub struct NewSupportMessage {
    pub conversation_id: i32,
    pub role: String,
    pub content: String,
    pub rag_source_ids: Option<Vec<String>>,
    pub ai_model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSupportMessage {
    pub fn plain(conversation_id: i32, role: &str, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: role.to_string(),
            content: content.into(),
            rag_source_ids: None,
            ai_model_version: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = support_tickets)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: i32,
    pub conversation_id: Option<i32>,
    pub customer_id: i32,
    pub ticket_number: String,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub assigned_agent_id: Option<i32>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub support_bundle: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = support_tickets)]
pub struct NewSupportTicket {
    pub conversation_id: Option<i32>,
    pub customer_id: i32,
    pub ticket_number: String,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub support_bundle: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
#[diesel(table_name = knowledge_base)]
#[serde(rename_all = "camelCase")]
pub struct KbArticle {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub is_public: bool,
    pub is_active_for_ai: bool,
    pub view_count: i32,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = knowledge_base)]
pub struct NewKbArticle {
    pub title: String,
    pub content: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub is_public: bool,
    pub is_active_for_ai: bool,
    pub view_count: i32,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer fields exposed to admin ticket views.
#[derive(Debug, Clone, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
}
