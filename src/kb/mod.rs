use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::shared::error::AppError;
use crate::shared::models::KbArticle;
use crate::shared::schema::knowledge_base;
use crate::shared::state::AppState;

/// Retrieves up to three article snippets for LLM prompt augmentation.
///
/// Naive substring retrieval: `ILIKE '%query%'` on title or content, no
/// ranking beyond database order. A query with rare phrasing can miss a
/// relevant article that is worded differently.
pub fn search_knowledge_base(
    conn: &mut PgConnection,
    query: &str,
) -> Result<Vec<String>, AppError> {
    let articles: Vec<KbArticle> = search_query(format!("%{query}%")).load(conn)?;
    Ok(articles.iter().map(format_snippet).collect())
}

fn search_query(pattern: String) -> knowledge_base::BoxedQuery<'static, Pg> {
    knowledge_base::table
        .filter(knowledge_base::is_active_for_ai.eq(true))
        .filter(
            knowledge_base::title
                .ilike(pattern.clone())
                .or(knowledge_base::content.ilike(pattern)),
        )
        .limit(3)
        .into_boxed()
}

fn format_snippet(article: &KbArticle) -> String {
    format!(
        "[{}] {}: {}",
        article.category, article.title, article.content
    )
}

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub category: Option<String>,
}

/// Listing projection for the public Help Center. Moderation and AI flags
/// stay internal.
#[derive(Debug, Clone, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct PublicArticle {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub view_count: i32,
    pub helpful_count: i32,
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<Vec<PublicArticle>>, AppError> {
    let mut conn = state.conn.get()?;

    let mut q = knowledge_base::table
        .filter(knowledge_base::is_public.eq(true))
        .select((
            knowledge_base::id,
            knowledge_base::title,
            knowledge_base::content,
            knowledge_base::category,
            knowledge_base::subcategory,
            knowledge_base::view_count,
            knowledge_base::helpful_count,
        ))
        .into_boxed();

    if let Some(category) = query.category {
        q = q.filter(knowledge_base::category.eq(category));
    }

    let articles: Vec<PublicArticle> = q.load(&mut conn)?;
    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<KbArticle>, AppError> {
    let mut conn = state.conn.get()?;

    let article: KbArticle = knowledge_base::table
        .filter(knowledge_base::id.eq(id))
        .filter(knowledge_base::is_public.eq(true))
        .first(&mut conn)
        .optional()?
        .ok_or(AppError::NotFound("Article"))?;

    diesel::update(knowledge_base::table.filter(knowledge_base::id.eq(id)))
        .set(knowledge_base::view_count.eq(article.view_count + 1))
        .execute(&mut conn)?;

    Ok(Json(article))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub helpful: bool,
}

pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut conn = state.conn.get()?;

    let article: KbArticle = knowledge_base::table
        .filter(knowledge_base::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or(AppError::NotFound("Article"))?;

    if req.helpful {
        diesel::update(knowledge_base::table.filter(knowledge_base::id.eq(id)))
            .set(knowledge_base::helpful_count.eq(article.helpful_count + 1))
            .execute(&mut conn)?;
    } else {
        diesel::update(knowledge_base::table.filter(knowledge_base::id.eq(id)))
            .set(knowledge_base::not_helpful_count.eq(article.not_helpful_count + 1))
            .execute(&mut conn)?;
    }

    Ok(Json(json!({ "success": true })))
}

pub fn configure_help_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/help/articles", get(list_articles))
        .route("/help/articles/:id", get(get_article))
        .route("/help/articles/:id/feedback", post(submit_feedback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(category: &str, title: &str, content: &str) -> KbArticle {
        KbArticle {
            id: 1,
            title: title.to_string(),
            content: content.to_string(),
            category: category.to_string(),
            subcategory: None,
            keywords: None,
            is_public: true,
            is_active_for_ai: true,
            view_count: 0,
            helpful_count: 0,
            not_helpful_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snippet_format_matches_prompt_contract() {
        let a = article("faq", "Voucher expiry", "Vouchers expire after 90 days.");
        assert_eq!(
            format_snippet(&a),
            "[faq] Voucher expiry: Vouchers expire after 90 days."
        );
    }

    #[test]
    fn retrieval_query_caps_results_and_excludes_inactive_articles() {
        let sql = diesel::debug_query::<Pg, _>(&search_query("%voucher%".to_string())).to_string();
        assert!(sql.contains("\"is_active_for_ai\""), "missing flag filter: {sql}");
        assert!(sql.contains("ILIKE"), "missing substring match: {sql}");
        assert!(sql.contains("LIMIT"), "missing limit clause: {sql}");
        // The limit value is the last bind parameter.
        assert!(sql.ends_with("3]"), "limit bind is not 3: {sql}");
    }

    #[test]
    fn public_listing_omits_moderation_fields() {
        let a = PublicArticle {
            id: 1,
            title: "Voucher expiry".to_string(),
            content: "Vouchers expire after 90 days.".to_string(),
            category: "faq".to_string(),
            subcategory: None,
            view_count: 12,
            helpful_count: 3,
        };
        let value = serde_json::to_value(&a).expect("serialize");
        let obj = value.as_object().expect("object");
        assert!(obj.contains_key("viewCount"));
        assert!(obj.contains_key("helpfulCount"));
        assert!(!obj.contains_key("isPublic"));
        assert!(!obj.contains_key("isActiveForAI"));
        assert!(!obj.contains_key("notHelpfulCount"));
        assert!(!obj.contains_key("keywords"));
    }
}
