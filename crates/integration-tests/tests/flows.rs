//! End-to-end flows against a real database.
//!
//! Run with `PARLEY_TEST_DATABASE_URL` set and `--ignored`. Each test
//! registers its own tenants, so the database can be shared between runs.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use parley_integration_tests::{
    APP_SECRET, PAYMENT_WEBHOOK_SECRET, TenantClient, fake_graph_api, fake_image_host,
    fake_payment_gateway, send, test_config, test_pool,
};
use parley_server::config::{ImageHostConfig, ServerConfig};
use parley_server::signature::hmac_sha256_hex;
use parley_server::state::AppState;

async fn app_with(configure: impl FnOnce(&mut ServerConfig)) -> Option<(Router, AppState)> {
    let pool = test_pool().await?;
    let mut config = test_config("postgres://from-pool");
    configure(&mut config);
    let state = AppState::new(config, pool).unwrap();
    Some((parley_server::app(state.clone()).unwrap(), state))
}

async fn app_with_graph(graph_url: Option<String>) -> Option<(Router, AppState)> {
    app_with(|config| {
        if let Some(url) = graph_url {
            config.whatsapp.graph_url = url;
        }
    })
    .await
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn unique_phone_number_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("pnid{nanos}")
}

async fn create_contact(client: &TenantClient, phone: &str, name: &str) -> i64 {
    let (status, contact) = client
        .post("/api/contacts", json!({"phone": phone, "name": name}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");
    contact["id"].as_i64().unwrap()
}

async fn deliver_webhook(app: &Router, payload: &Value) -> (StatusCode, Value) {
    let body = payload.to_string();
    let digest = hmac_sha256_hex(APP_SECRET.as_bytes(), body.as_bytes()).unwrap();
    let signature = format!("sha256={digest}");
    let request = Request::post("/api/webhooks/whatsapp")
        .header("content-type", "application/json")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn deliver_payment_webhook(app: &Router, payload: &Value) -> (StatusCode, Value) {
    let body = payload.to_string();
    let signature = hmac_sha256_hex(PAYMENT_WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();
    let request = Request::post("/api/webhooks/payments")
        .header("content-type", "application/json")
        .header("x-razorpay-signature", signature)
        .body(Body::from(body))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// A gateway event for the link created from `request`, echoing its
/// reference id and notes the way the gateway does.
fn link_event(event: &str, request: &Value, gateway_payment_id: &str) -> Value {
    let reference = request["reference_id"].as_str().unwrap();
    json!({
        "event": event,
        "payload": {
            "payment_link": {"entity": {
                "id": format!("plink_{reference}"),
                "reference_id": reference,
                "status": event.trim_start_matches("payment_link."),
                "amount_paid": request["amount"],
                "notes": request["notes"],
            }},
            "payment": {"entity": {
                "id": gateway_payment_id,
                "amount": request["amount"],
                "method": "upi",
            }},
        }
    })
}

fn change(phone_number_id: &str, value: Value) -> Value {
    let mut value = value;
    value["messaging_product"] = json!("whatsapp");
    value["metadata"] = json!({"display_phone_number": "15550001111", "phone_number_id": phone_number_id});
    json!({
        "object": "whatsapp_business_account",
        "entry": [{"id": "WABA", "changes": [{"field": "messages", "value": value}]}]
    })
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_tenants_cannot_see_each_others_records() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let alice = TenantClient::register(&app, "alice").await;
    let bob = TenantClient::register(&app, "bob").await;

    let contact = create_contact(&alice, "+91 98765 43210", "Asha").await;
    let uri = format!("/api/contacts/{contact}");

    assert_eq!(alice.get(&uri).await.0, StatusCode::OK);
    assert_eq!(bob.get(&uri).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        bob.put(&uri, json!({"phone": "919876543210", "name": "Stolen"})).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(bob.delete(&uri).await.0, StatusCode::NOT_FOUND);

    let (_, listed) = bob.get("/api/contacts").await;
    assert_eq!(listed.as_array().unwrap().len(), 0);

    // Bob may hold the same phone number as his own contact.
    create_contact(&bob, "919876543210", "Asha (Bob)").await;
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_duplicate_phone_within_tenant_conflicts() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "dupes").await;

    create_contact(&client, "+1 555 010 0001", "First").await;
    let (status, _) = client
        .post("/api/contacts", json!({"phone": "15550100001", "name": "Second"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_quotation_numbering_conversion_and_settlement() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "sales").await;
    let contact = create_contact(&client, "+44 20 7946 0958", "Priya").await;

    let (status, product) = client
        .post("/api/products", json!({"name": "Saree", "price": "1200.00"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let items = json!([
        {"product_id": product["id"], "quantity": 2},
        {"description": "Gift wrap", "quantity": 1, "unit_price": "50.00"}
    ]);
    let (status, first) = client
        .post("/api/quotations", json!({"contact_id": contact, "items": items}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["number"], "QT-0001");
    assert_eq!(amount(&first["total"]), Decimal::new(245_000, 2));
    assert_eq!(first["items"][0]["description"], "Saree");

    let (_, second) = client
        .post(
            "/api/quotations",
            json!({"contact_id": contact, "items": [{"description": "Dupatta", "quantity": 1, "unit_price": "300"}]}),
        )
        .await;
    assert_eq!(second["number"], "QT-0002");

    // Lines are validated before anything is written.
    let (status, _) = client
        .post(
            "/api/quotations",
            json!({"contact_id": contact, "items": [{"description": "Nothing", "quantity": 0, "unit_price": "1"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = first["id"].as_i64().unwrap();
    let (status, order) = client
        .post(&format!("/api/quotations/{id}/convert"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["number"], "ORD-0001");
    assert_eq!(order["quotation_id"], first["id"]);
    assert_eq!(order["total"], first["total"]);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    let (_, converted) = client.get(&format!("/api/quotations/{id}")).await;
    assert_eq!(converted["status"], "accepted");

    let (status, _) = client
        .post(&format!("/api/quotations/{id}/convert"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let order_id = order["id"].as_i64().unwrap();
    let (status, _) = client
        .post(
            "/api/payments",
            json!({"order_id": order_id, "amount": "1000.00", "method": "cash"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, partial) = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(partial["payment_status"], "partially_paid");

    client
        .post(
            "/api/payments",
            json!({"order_id": order_id, "amount": "1450.00", "method": "upi"}),
        )
        .await;
    let (_, paid) = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["payments"].as_array().unwrap().len(), 2);

    // Both ids is ambiguous.
    let (status, _) = client
        .post(
            "/api/payments",
            json!({"order_id": order_id, "quotation_id": id, "amount": "1", "method": "cash"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stats) = client.get("/api/dashboard/stats").await;
    assert_eq!(stats["contacts"], 1);
    assert_eq!(amount(&stats["revenue"]), Decimal::new(245_000, 2));
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_numbering_is_per_tenant() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    for name in ["north", "south"] {
        let client = TenantClient::register(&app, name).await;
        let contact = create_contact(&client, "+61 2 9374 4000", "Sam").await;
        let (_, quotation) = client
            .post(
                "/api/quotations",
                json!({"contact_id": contact, "items": [{"description": "Tea", "quantity": 3, "unit_price": "4.50"}]}),
            )
            .await;
        assert_eq!(quotation["number"], "QT-0001");
    }
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_inbound_messages_are_stored_once() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "inbound").await;
    let phone_number_id = unique_phone_number_id();
    let (status, _) = client
        .put(
            "/api/settings",
            json!({"whatsapp_phone_number_id": phone_number_id, "whatsapp_access_token": "EAAG-test"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let payload = change(
        &phone_number_id,
        json!({
            "contacts": [{"profile": {"name": "Meera"}, "wa_id": "919812345678"}],
            "messages": [{
                "from": "919812345678",
                "id": format!("wamid.IN-{phone_number_id}"),
                "timestamp": "1700000000",
                "type": "text",
                "text": {"body": "Is the blue one in stock?"}
            }]
        }),
    );

    let (status, outcome) = deliver_webhook(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["messages_stored"], 1);
    assert_eq!(outcome["contacts_created"], 1);

    let (status, outcome) = deliver_webhook(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["messages_stored"], 0);
    assert_eq!(outcome["duplicates"], 1);

    let (_, contacts) = client.get("/api/contacts").await;
    let contacts = contacts.as_array().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0]["name"], "Meera");

    let contact = contacts[0]["id"].as_i64().unwrap();
    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["direction"], "inbound");
    assert_eq!(messages[0]["body"], "Is the blue one in stock?");
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_redelivered_media_is_not_uploaded_again() {
    let graph = fake_graph_api().await;
    let (upload_url, uploads) = fake_image_host().await;
    let Some((app, _)) = app_with(|config| {
        config.whatsapp.graph_url = graph;
        config.image_host = Some(ImageHostConfig {
            api_key: "img-key".to_string().into(),
            upload_url,
        });
    })
    .await
    else {
        return;
    };
    let client = TenantClient::register(&app, "media").await;
    let phone_number_id = unique_phone_number_id();
    client
        .put(
            "/api/settings",
            json!({"whatsapp_phone_number_id": phone_number_id, "whatsapp_access_token": "EAAG-test"}),
        )
        .await;

    let payload = change(
        &phone_number_id,
        json!({
            "contacts": [{"profile": {"name": "Ravi"}, "wa_id": "919811122233"}],
            "messages": [{
                "from": "919811122233",
                "id": format!("wamid.IMG-{phone_number_id}"),
                "timestamp": "1700000000",
                "type": "image",
                "image": {"id": format!("media-{phone_number_id}"), "mime_type": "image/jpeg", "caption": "This one"}
            }]
        }),
    );

    let (status, outcome) = deliver_webhook(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["messages_stored"], 1);
    assert_eq!(uploads.load(std::sync::atomic::Ordering::SeqCst), 1);

    for _ in 0..2 {
        let (status, outcome) = deliver_webhook(&app, &payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["duplicates"], 1);
        assert_eq!(outcome["contacts_created"], 0);
    }
    assert_eq!(uploads.load(std::sync::atomic::Ordering::SeqCst), 1);

    let (_, contacts) = client.get("/api/contacts").await;
    let contact = contacts[0]["id"].as_i64().unwrap();
    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["media_url"], "https://img.test/1.jpg");
    assert_eq!(messages[0]["body"], "This one");
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_outbound_status_never_regresses() {
    let graph = fake_graph_api().await;
    let Some((app, _)) = app_with_graph(Some(graph)).await else { return };
    let client = TenantClient::register(&app, "statuses").await;
    let phone_number_id = unique_phone_number_id();
    client
        .put(
            "/api/settings",
            json!({"whatsapp_phone_number_id": phone_number_id, "whatsapp_access_token": "EAAG-test"}),
        )
        .await;
    let contact = create_contact(&client, "+1 415 555 2671", "Lee").await;

    let (status, sent) = client
        .post(
            &format!("/api/contacts/{contact}/messages"),
            json!({"type": "text", "body": "Your order has shipped"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sent}");
    assert_eq!(sent["status"], "sent");
    let wamid = sent["wamid"].as_str().unwrap().to_string();

    let statuses = |status: &str| {
        change(
            &phone_number_id,
            json!({"statuses": [{"id": wamid, "status": status, "recipient_id": "14155552671"}]}),
        )
    };

    let (_, outcome) = deliver_webhook(&app, &statuses("read")).await;
    assert_eq!(outcome["statuses_applied"], 1);
    let (_, outcome) = deliver_webhook(&app, &statuses("delivered")).await;
    assert_eq!(outcome["statuses_applied"], 0);

    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    assert_eq!(messages[0]["status"], "read");

    // A late failure still lands, and nothing moves a failed message.
    let (_, outcome) = deliver_webhook(&app, &statuses("failed")).await;
    assert_eq!(outcome["statuses_applied"], 1);
    let (_, outcome) = deliver_webhook(&app, &statuses("delivered")).await;
    assert_eq!(outcome["statuses_applied"], 0);

    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    assert_eq!(messages[0]["status"], "failed");
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_send_without_credentials_is_rejected() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "nocreds").await;
    let contact = create_contact(&client, "+1 415 555 2672", "Kim").await;

    let (status, _) = client
        .post(
            &format!("/api/contacts/{contact}/messages"),
            json!({"type": "text", "body": "hello"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    assert_eq!(messages.as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_login_logout_round_trip() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "session").await;

    let (status, me) = client.get("/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["business_name"], "session");

    assert_eq!(
        client.call("POST", "/api/auth/logout", None).await.0,
        StatusCode::NO_CONTENT
    );
    assert_eq!(client.get("/api/auth/me").await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_broadcast_to_tag_completes_in_background() {
    let graph = fake_graph_api().await;
    let Some((app, _)) = app_with_graph(Some(graph)).await else { return };
    let client = TenantClient::register(&app, "broadcaster").await;
    client
        .put(
            "/api/settings",
            json!({"whatsapp_phone_number_id": unique_phone_number_id(), "whatsapp_access_token": "EAAG-test"}),
        )
        .await;

    let (status, tag) = client.post("/api/tags", json!({"name": "VIP"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["color"], "#64748b");

    let tagged = [
        create_contact(&client, "+91 90000 00001", "One").await,
        create_contact(&client, "+91 90000 00002", "Two").await,
    ];
    create_contact(&client, "+91 90000 00003", "Untagged").await;
    for contact in tagged {
        let (status, _) = client
            .post(&format!("/api/contacts/{contact}/tags/{}", tag["id"]), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, broadcast) = client
        .post("/api/broadcasts", json!({"name": "Diwali sale", "body": "20% off this week"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/broadcasts/{}", broadcast["id"]);

    let (status, accepted) = client
        .post(&format!("{uri}/send"), json!({"tag_id": tag["id"]}))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{accepted}");
    assert_eq!(accepted["recipient_count"], 2);

    // A broadcast is sent at most once.
    let (status, _) = client
        .post(&format!("{uri}/send"), json!({"tag_id": tag["id"]}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut detail = Value::Null;
    for _ in 0..50 {
        detail = client.get(&uri).await.1;
        if detail["status"] == "completed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert_eq!(detail["status"], "completed", "{detail}");
    assert_eq!(detail["sent_count"], 2);
    assert_eq!(detail["failed_count"], 0);
    let recipients = detail["recipients"].as_array().unwrap();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.iter().all(|r| r["status"] == "sent"));
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_due_reminders_fire_once() {
    let Some((app, state)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "reminders").await;
    let mut events = state.events().subscribe();

    let past = (chrono::Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
    let future = (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339();
    let (status, due) = client
        .post("/api/reminders", json!({"title": "Call back about saree", "due_at": past}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{due}");
    let (_, later) = client
        .post("/api/reminders", json!({"title": "Follow up", "due_at": future}))
        .await;

    let fired = parley_server::services::reminders::sweep_once(&state).await.unwrap();
    assert!(fired >= 1);

    let (_, due) = client.get(&format!("/api/reminders/{}", due["id"])).await;
    assert_eq!(due["status"], "sent");
    let (_, later) = client.get(&format!("/api/reminders/{}", later["id"])).await;
    assert_eq!(later["status"], "pending");

    let event = loop {
        let event = events.recv().await.unwrap();
        if event.event == parley_server::realtime::events::REMINDER_DUE
            && event.data["id"] == due["id"]
        {
            break event;
        }
    };
    assert_eq!(event.data["title"], "Call back about saree");

    // Already sent, so a second sweep leaves it alone.
    parley_server::services::reminders::sweep_once(&state).await.unwrap();
    let (_, again) = client.get(&format!("/api/reminders/{}", due["id"])).await;
    assert_eq!(again["updated_at"], due["updated_at"]);
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_reminder_is_marked_sent_even_when_notification_fails() {
    let Some((app, state)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "notify").await;
    let contact = create_contact(&client, "+91 98000 22222", "Dev").await;

    // No WhatsApp credentials, so the contact cannot be messaged.
    let past = (chrono::Utc::now() - chrono::Duration::minutes(1)).to_rfc3339();
    let (status, reminder) = client
        .post(
            "/api/reminders",
            json!({"contact_id": contact, "title": "Payment due", "due_at": past, "notify_contact": true}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{reminder}");
    let uri = format!("/api/reminders/{}", reminder["id"]);

    parley_server::services::reminders::sweep_once(&state).await.unwrap();
    let (_, fired) = client.get(&uri).await;
    assert_eq!(fired["status"], "sent");

    parley_server::services::reminders::sweep_once(&state).await.unwrap();
    let (_, again) = client.get(&uri).await;
    assert_eq!(again["updated_at"], fired["updated_at"]);

    let (_, messages) = client.get(&format!("/api/contacts/{contact}/messages")).await;
    assert_eq!(messages.as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_amounts_beyond_column_range_are_rejected() {
    let Some((app, _)) = app_with_graph(None).await else { return };
    let client = TenantClient::register(&app, "bigspender").await;
    let contact = create_contact(&client, "+91 98111 00000", "Vik").await;

    let line = |quantity: u32, unit_price: &str| {
        json!({"description": "Gold bar", "quantity": quantity, "unit_price": unit_price})
    };

    // One line over the column range.
    let (status, body) = client
        .post(
            "/api/orders",
            json!({"contact_id": contact, "items": [line(2, "9999999999.99")]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // Lines that fit alone but not together.
    let (status, body) = client
        .post(
            "/api/quotations",
            json!({"contact_id": contact, "items": [line(1, "6000000000.00"), line(1, "6000000000.00")]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // A price that is not a representable amount never decodes.
    let (status, _) = client
        .post(
            "/api/orders",
            json!({"contact_id": contact, "items": [line(1, "79228162514264337593543950335")]}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(client.get("/api/orders").await.1.as_array().unwrap().len(), 0);
    assert_eq!(client.get("/api/quotations").await.1.as_array().unwrap().len(), 0);

    // The largest amount the column holds is accepted.
    let (status, order) = client
        .post(
            "/api/orders",
            json!({"contact_id": contact, "items": [line(1, "9999999999.99")]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(amount(&order["total"]), Decimal::new(999_999_999_999, 2));
}

#[tokio::test]
#[ignore = "requires PARLEY_TEST_DATABASE_URL"]
async fn test_gateway_webhooks_settle_orders_once() {
    let (gateway_url, requests) = fake_payment_gateway().await;
    let Some((app, _)) = app_with(|config| {
        if let Some(payments) = config.payments.as_mut() {
            payments.api_url = gateway_url;
        }
    })
    .await
    else {
        return;
    };
    let client = TenantClient::register(&app, "gateway").await;
    let contact = create_contact(&client, "+91 97000 11111", "Nisha").await;
    let (status, order) = client
        .post(
            "/api/orders",
            json!({"contact_id": contact, "items": [{"description": "Lamp", "quantity": 2, "unit_price": "500.00"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order_uri = format!("/api/orders/{}", order["id"]);

    let create_link = |amount: Option<&str>| {
        let mut body = json!({"order_id": order["id"]});
        if let Some(amount) = amount {
            body["amount"] = json!(amount);
        }
        body
    };

    // Part payment through a link.
    let (status, first) = client.post("/api/payments/links", create_link(Some("400.00"))).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["status"], "pending");
    let first_request = requests.lock().unwrap().last().cloned().unwrap();
    assert_eq!(first_request["amount"], 40_000);

    let paid = link_event("payment_link.paid", &first_request, "pay_first");
    let (status, outcome) = deliver_payment_webhook(&app, &paid).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "applied");

    let (_, detail) = client.get(&order_uri).await;
    assert_eq!(detail["payment_status"], "partially_paid");
    assert_eq!(detail["payments"][0]["status"], "paid");
    assert_eq!(detail["payments"][0]["gateway_payment_id"], "pay_first");

    // Replays change nothing and are not counted twice.
    let (_, outcome) = deliver_payment_webhook(&app, &paid).await;
    assert_eq!(outcome["status"], "unchanged");
    let (_, detail) = client.get(&order_uri).await;
    assert_eq!(detail["payment_status"], "partially_paid");
    assert_eq!(detail["payments"].as_array().unwrap().len(), 1);

    // A cancelled link closes its pending row without touching settlement.
    let (_, second) = client.post("/api/payments/links", create_link(Some("100.00"))).await;
    let second_request = requests.lock().unwrap().last().cloned().unwrap();
    let cancelled = link_event("payment_link.cancelled", &second_request, "pay_none");
    let (_, outcome) = deliver_payment_webhook(&app, &cancelled).await;
    assert_eq!(outcome["status"], "applied");
    let (_, outcome) = deliver_payment_webhook(&app, &cancelled).await;
    assert_eq!(outcome["status"], "unchanged");

    let (_, detail) = client.get(&order_uri).await;
    let closed = detail["payments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == second["id"])
        .unwrap()
        .clone();
    assert_eq!(closed["status"], "cancelled");
    assert_eq!(detail["payment_status"], "partially_paid");

    // The default amount is the outstanding balance, and paying it settles.
    let (status, third) = client.post("/api/payments/links", create_link(None)).await;
    assert_eq!(status, StatusCode::CREATED, "{third}");
    assert_eq!(amount(&third["amount"]), Decimal::new(60_000, 2));
    let third_request = requests.lock().unwrap().last().cloned().unwrap();
    let (_, outcome) =
        deliver_payment_webhook(&app, &link_event("payment_link.paid", &third_request, "pay_rest"))
            .await;
    assert_eq!(outcome["status"], "applied");

    let (_, detail) = client.get(&order_uri).await;
    assert_eq!(detail["payment_status"], "paid");

    // Unknown references and foreign tenants are acknowledged without effect.
    let mut unknown = third_request.clone();
    unknown["reference_id"] = json!("2147483000");
    let (status, outcome) =
        deliver_payment_webhook(&app, &link_event("payment_link.paid", &unknown, "pay_x")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "unchanged");

    let other = TenantClient::register(&app, "gateway-other").await;
    let (_, other_me) = other.get("/api/auth/me").await;
    let mut foreign = second_request.clone();
    foreign["notes"]["tenant_id"] = json!(other_me["id"].to_string());
    let (_, outcome) =
        deliver_payment_webhook(&app, &link_event("payment_link.paid", &foreign, "pay_y")).await;
    assert_eq!(outcome["status"], "unchanged");

    let mut anonymous = second_request;
    anonymous["notes"] = json!({});
    let (_, outcome) =
        deliver_payment_webhook(&app, &link_event("payment_link.paid", &anonymous, "pay_z")).await;
    assert_eq!(outcome["status"], "unchanged");

    let (_, detail) = client.get(&order_uri).await;
    let statuses: Vec<&str> = detail["payments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses.iter().filter(|s| **s == "paid").count(), 2);
    assert!(statuses.contains(&"cancelled"));
}
