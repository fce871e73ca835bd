diesel::table! {
    customers (id) {
        id -> Int4,
        email -> Text,
        name -> Text,
        phone -> Nullable<Text>,
        membership_tier -> Text,
        loyalty_points -> Int4,
        balance -> Numeric,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    customer_sessions (token) {
        token -> Text,
        customer_id -> Int4,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    restaurants (id) {
        id -> Int4,
        name -> Text,
        description -> Nullable<Text>,
        cuisine -> Text,
        price_range -> Text,
        rating -> Numeric,
        review_count -> Int4,
        is_popular -> Bool,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    support_conversations (id) {
        id -> Int4,
        customer_id -> Int4,
        title -> Nullable<Text>,
        status -> Text,
        channel -> Text,
        is_handled_by_ai -> Bool,
        escalated_at -> Nullable<Timestamptz>,
        escalation_reason -> Nullable<Text>,
        last_message_at -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    support_messages (id) {
        id -> Int4,
        conversation_id -> Int4,
        role -> Text,
        content -> Text,
        rag_source_ids -> Nullable<Array<Text>>,
        ai_model_version -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    support_tickets (id) {
        id -> Int4,
        conversation_id -> Nullable<Int4>,
        customer_id -> Int4,
        ticket_number -> Text,
        subject -> Text,
        description -> Text,
        category -> Text,
        priority -> Text,
        status -> Text,
        assigned_agent_id -> Nullable<Int4>,
        assigned_at -> Nullable<Timestamptz>,
        resolution -> Nullable<Text>,
        resolved_at -> Nullable<Timestamptz>,
        support_bundle -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    knowledge_base (id) {
        id -> Int4,
        title -> Text,
        content -> Text,
        category -> Text,
        subcategory -> Nullable<Text>,
        keywords -> Nullable<Array<Text>>,
        is_public -> Bool,
        is_active_for_ai -> Bool,
        view_count -> Int4,
        helpful_count -> Int4,
        not_helpful_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(support_conversations -> customers (customer_id));
diesel::joinable!(support_messages -> support_conversations (conversation_id));
diesel::joinable!(support_tickets -> customers (customer_id));
diesel::joinable!(customer_sessions -> customers (customer_id));

diesel::allow_tables_to_appear_in_same_query!(
    customers,
    customer_sessions,
    restaurants,
    support_conversations,
    support_messages,
    support_tickets,
    knowledge_base,
);
