use chrono::{Datelike, Utc};
use diesel::prelude::*;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};

use crate::shared::error::AppError;
use crate::shared::models::Customer;
use crate::shared::schema::customers;

/// Trigger phrases for automatic handoff to a human agent. Matching is a
/// plain case-insensitive substring scan; first hit wins. Romanian and
/// English are mixed because users write in either.
pub const ESCALATION_KEYWORDS: &[&str] = &[
    "refund",
    "rambursare",
    "banii înapoi",
    "money back",
    "payment failed",
    "plată eșuată",
    "charged twice",
    "taxat de două ori",
    "cancel subscription",
    "anulare abonament",
    "account hacked",
    "cont spart",
    "security",
    "securitate",
    "legal",
    "lawyer",
    "avocat",
    "sue",
    "proces",
    "speak to human",
    "human agent",
    "operator",
    "agent real",
    "complaint",
    "reclamație",
    "manager",
    "supervisor",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationHit {
    pub keyword: &'static str,
    pub reason: String,
}

/// Scans a user message for escalation triggers. No stemming, no negation
/// handling: "I do NOT want a refund" still escalates.
pub fn check_escalation(message: &str) -> Option<EscalationHit> {
    let lower = message.to_lowercase();

    for keyword in ESCALATION_KEYWORDS {
        if lower.contains(&keyword.to_lowercase()) {
            return Some(EscalationHit {
                keyword,
                reason: format!("User mentioned: \"{keyword}\""),
            });
        }
    }

    None
}

/// A conversation gets at most one automatic ticket. Once it is escalated,
/// later trigger phrases fall through to the normal reply pipeline.
pub fn should_auto_ticket(conversation_status: &str) -> bool {
    conversation_status != "escalated"
}

/// Ticket numbers look like `TKT-2026-A1B2C3`.
pub fn generate_ticket_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TKT-{}-{}", Utc::now().year(), suffix)
}

/// Snapshot of the customer attached to a ticket so agents get context
/// without extra lookups.
pub fn build_support_bundle(
    conn: &mut PgConnection,
    customer_id: i32,
) -> Result<Option<Value>, AppError> {
    let customer: Option<Customer> = customers::table
        .filter(customers::id.eq(customer_id))
        .first(conn)
        .optional()?;

    Ok(customer.map(|c| {
        json!({
            "customer": {
                "id": c.id,
                "name": c.name,
                "email": c.email,
                "membershipTier": c.membership_tier,
                "loyaltyPoints": c.loyalty_points,
                "createdAt": c.created_at,
            },
            "generatedAt": Utc::now(),
        })
    }))
}

/// Bilingual acknowledgment sent instead of an LLM reply when a
/// conversation escalates.
pub fn escalation_acknowledgment(ticket_number: &str) -> String {
    format!(
        "Am înțeles că ai nevoie de ajutor cu această problemă. Am creat un \
         ticket de suport ({ticket_number}) și un agent real va răspunde în \
         cel mai scurt timp. Între timp, pot să te ajut cu altceva?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_message_escalates_with_reason() {
        let hit = check_escalation("I want a refund for my order").expect("should escalate");
        assert_eq!(hit.keyword, "refund");
        assert_eq!(hit.reason, "User mentioned: \"refund\"");
    }

    #[test]
    fn benign_message_does_not_escalate() {
        assert!(check_escalation("How do I find vegan restaurants near me?").is_none());
    }

    #[test]
    fn matching_is_case_insensitive_and_position_independent() {
        assert!(check_escalation("REFUND please").is_some());
        assert!(check_escalation("my card was Charged Twice yesterday").is_some());
        assert!(check_escalation("vreau să vorbesc cu un OPERATOR").is_some());
    }

    #[test]
    fn every_configured_keyword_triggers() {
        for keyword in ESCALATION_KEYWORDS {
            let message = format!("context before {keyword} context after");
            let hit = check_escalation(&message).expect("keyword should escalate");
            assert!(hit.reason.contains(keyword));
        }
    }

    #[test]
    fn negated_mentions_still_escalate() {
        // Known false-positive class, preserved on purpose.
        assert!(check_escalation("I do NOT want a refund").is_some());
    }

    #[test]
    fn only_unescalated_conversations_get_automatic_tickets() {
        assert!(should_auto_ticket("active"));
        assert!(should_auto_ticket("resolved"));
        assert!(!should_auto_ticket("escalated"));
    }

    #[test]
    fn ticket_numbers_rarely_collide_within_a_batch() {
        let numbers: std::collections::HashSet<String> =
            (0..100).map(|_| generate_ticket_number()).collect();
        // Collisions over 36^6 values in a batch of 100 would point at a
        // broken generator rather than bad luck.
        assert!(numbers.len() > 95);
    }

    #[test]
    fn ticket_number_has_expected_shape() {
        let number = generate_ticket_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TKT");
        assert_eq!(parts[1].len(), 4);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn acknowledgment_embeds_ticket_number() {
        let message = escalation_acknowledgment("TKT-2026-ABC123");
        assert!(message.contains("TKT-2026-ABC123"));
    }
}
