use serde_json::{json, Value as JsonValue};

/// Webhook event payload builders mirroring what Stripe actually sends,
/// trimmed to the fields the handlers read.

pub fn payment_intent_event(
    event_type: &str,
    intent_id: &str,
    amount: i64,
    status: &str,
    user_id: Option<&str>,
) -> JsonValue {
    let mut metadata = json!({});
    if let Some(uid) = user_id {
        metadata["userId"] = json!(uid);
    }
    json!({
        "id": format!("evt_{}", intent_id),
        "type": event_type,
        "created": 1706500000,
        "data": {
            "object": {
                "id": intent_id,
                "amount": amount,
                "currency": "usd",
                "status": status,
                "metadata": metadata,
            }
        }
    })
}

pub fn subscription_event(
    event_type: &str,
    subscription_id: &str,
    customer_id: &str,
    status: &str,
) -> JsonValue {
    json!({
        "id": format!("evt_{}", subscription_id),
        "type": event_type,
        "created": 1706500000,
        "data": {
            "object": {
                "id": subscription_id,
                "customer": customer_id,
                "status": status,
                "current_period_start": 1706500000,
                "current_period_end": 1709178400,
                "cancel_at_period_end": false,
                "items": {"data": [{"price": {"id": "price_basic"}}]},
                "metadata": {},
            }
        }
    })
}

pub fn invoice_event(
    event_type: &str,
    invoice_id: &str,
    subscription_id: Option<&str>,
    amount_due: i64,
    amount_paid: i64,
    attempt_count: i32,
) -> JsonValue {
    json!({
        "id": format!("evt_{}", invoice_id),
        "type": event_type,
        "created": 1706500000,
        "data": {
            "object": {
                "id": invoice_id,
                "customer": "cus_1",
                "subscription": subscription_id,
                "amount_due": amount_due,
                "amount_paid": amount_paid,
                "currency": "usd",
                "attempt_count": attempt_count,
                "metadata": {},
            }
        }
    })
}

pub fn checkout_session_event(session_id: &str, subscription_id: Option<&str>) -> JsonValue {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "created": 1706500000,
        "data": {
            "object": {
                "id": session_id,
                "customer": "cus_1",
                "subscription": subscription_id,
                "amount_total": 14900,
                "metadata": {},
            }
        }
    })
}
