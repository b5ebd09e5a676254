mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use appointment_backend::domain::ports::SavedCard;
use common::{parse_body, TestApp};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::timeout;
use tower::ServiceExt;

fn online_booking(date: &str, slot: &str, duration: u32, price_cents: i64) -> Value {
    json!({
        "date": date,
        "slot": slot,
        "duration_min": duration,
        "customer": {
            "name": "Maya Lin",
            "phone": "555-0199",
            "email": "Maya@Example.com",
            "notes": "first visit"
        },
        "services": [{"name": "Signature Facial", "price_cents": price_cents, "duration": "2 hours"}],
        "source_id": "cnon:card-nonce-ok",
        "save_card": true
    })
}

fn admin_booking(date: &str, slot: &str, payment: Value) -> Value {
    let mut body = json!({
        "date": date,
        "slot": slot,
        "customer": {"name": "Walk In", "phone": "555-0111"},
        "services": [{"name": "Lash Lift", "price_cents": 9001, "duration_min": 60}]
    });
    for (k, v) in payment.as_object().unwrap() {
        body[k] = v.clone();
    }
    body
}

#[tokio::test]
async fn test_online_booking_charges_deposit_and_writes_markers() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "2:00 PM", 180, 15001)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let booking = parse_body(res).await;

    assert_eq!(booking["is_main_booking"], true);
    assert_eq!(booking["deposit_paid_cents"], 7501);
    assert_eq!(booking["remaining_balance_cents"], 7500);
    assert_eq!(booking["payment"]["payment_type"], "deposit");
    assert_eq!(booking["payment"]["payment_id"], "pay_1");
    assert_eq!(booking["customer"]["email"], "maya@example.com");
    assert_eq!(booking["source"], "online");

    let charges = app.gateway.charges.lock().unwrap().clone();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].0, 7501);
    assert_eq!(charges[0].1.len(), 64);
    assert_eq!(app.gateway.saved_cards.lock().unwrap().len(), 1);

    let stored = app.stored_bookings().await;
    assert_eq!(stored.len(), 3);
    let id = booking["id"].as_str().unwrap();
    let markers: Vec<&Value> = stored.iter().filter(|b| b["parent_booking_id"] == id).collect();
    assert_eq!(markers.len(), 2);
    assert!(markers.iter().all(|m| m["total_amount_cents"] == 0 && m["is_blocked_slot"] == true));
    let marker_slots: Vec<&str> = markers.iter().map(|m| m["slot"].as_str().unwrap()).collect();
    assert_eq!(marker_slots, vec!["3:00 PM", "4:00 PM"]);

    assert_eq!(app.sent_subjects().await, vec!["NEW BOOKING RECEIVED".to_string()]);
}

#[tokio::test]
async fn test_long_service_past_cutoff_is_out_of_hours() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "7:00 PM", 180, 10000)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = parse_body(res).await;
    assert!(body["error"].as_str().unwrap().contains("7:00 PM"));

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "8:00 PM", 240, 10000)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(app.gateway.charges.lock().unwrap().is_empty());
    assert!(app.stored_bookings().await.is_empty());
}

#[tokio::test]
async fn test_unknown_slot_label_is_rejected() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    for slot in ["9:30 AM", "8:00 AM", "noon"] {
        let res = app.post_json("/api/v1/bookings", &online_booking(&date, slot, 60, 5000)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "slot {}", slot);
    }
}

#[tokio::test]
async fn test_overlapping_booking_conflicts_without_charging() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "1:00 PM", 120, 10000)).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // 12:00 PM for two hours would need the 1:00 PM start.
    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "12:00 PM", 120, 10000)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = parse_body(res).await;
    assert!(body["error"].as_str().unwrap().contains("1:00 PM"));

    // The continuation marker holds 2:00 PM.
    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "2:00 PM", 60, 5000)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert_eq!(app.gateway.charges.lock().unwrap().len(), 1);
    assert_eq!(app.stored_bookings().await.len(), 2);
}

#[tokio::test]
async fn test_declined_charge_books_nothing() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();
    app.gateway.fail_charges.store(true, Ordering::SeqCst);

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 5000)).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = parse_body(res).await;
    assert_eq!(body["error"], "Card declined.");

    assert!(app.stored_bookings().await.is_empty());
    assert_eq!(app.available_slots(date.parse().unwrap(), 60).await.len(), 11);
}

#[tokio::test]
async fn test_failed_save_returns_the_deposit() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();
    // The slot hold is written; confirming the paid booking is not.
    app.store.fail_booking_writes_after(1);

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 5000)).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(app.gateway.charges.lock().unwrap().len(), 1);
    let refunds = app.gateway.refunds.lock().unwrap().clone();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].payment_id, "pay_1");
    assert_eq!(refunds[0].amount_cents, 2500);
}

#[tokio::test]
async fn test_store_down_before_charging_moves_no_money() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();
    app.store.fail_booking_writes_after(0);

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 5000)).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(app.gateway.charges.lock().unwrap().is_empty());
    assert!(app.gateway.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_duration_cannot_double_book() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();
    let cash = json!({"source": "in-person", "payment_method": "cash"});

    let first = admin_booking(&date, "10:00 AM", cash.clone());
    let res = app.admin("POST", "/api/v1/admin/bookings", Some(&first)).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let mut huge = admin_booking(&date, "10:00 AM", cash.clone());
    huge["duration_min"] = json!(u32::MAX);
    let res = app.admin("POST", "/api/v1/admin/bookings", Some(&huge)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut summed = admin_booking(&date, "9:00 AM", cash);
    summed["services"] = json!([
        {"name": "Marathon", "price_cents": 100, "duration_min": 3_000_000_000u32},
        {"name": "Marathon", "price_cents": 100, "duration_min": 3_000_000_000u32}
    ]);
    let res = app.admin("POST", "/api/v1/admin/bookings", Some(&summed)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.stored_bookings().await.len(), 1);
}

#[tokio::test]
async fn test_negative_or_zero_prices_are_rejected() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, -10000)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing to deposit.
    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 0)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let paid = json!({"source": "manual", "payment_status": "paid-full"});
    let mut manual = admin_booking(&date, "11:00 AM", paid);
    manual["services"][0]["price_cents"] = json!(-500);
    let res = app.admin("POST", "/api/v1/admin/bookings", Some(&manual)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(app.gateway.charges.lock().unwrap().is_empty());
    assert!(app.stored_bookings().await.is_empty());
}

#[tokio::test]
async fn test_rebooking_with_a_new_card_gets_a_fresh_charge_key() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let mut first = online_booking(&date, "10:00 AM", 60, 5000);
    first["source_id"] = json!("cnon:card-A");
    let res = app.post_json("/api/v1/bookings", &first).await;
    let id = parse_body(res).await["id"].as_str().unwrap().to_string();
    app.admin("DELETE", &format!("/api/v1/admin/bookings/{}", id), None).await;

    let mut second = first.clone();
    second["source_id"] = json!("cnon:card-B");
    let res = app.post_json("/api/v1/bookings", &second).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let charges = app.gateway.charges.lock().unwrap().clone();
    assert_eq!(charges.len(), 2);
    assert_ne!(charges[0].1, charges[1].1);
}

#[tokio::test]
async fn test_concurrent_overlapping_bookings_admit_exactly_one() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let long = online_booking(&date, "1:00 PM", 120, 10000);
    let mut short = online_booking(&date, "2:00 PM", 60, 5000);
    short["source_id"] = json!("cnon:other-card");

    let (a, b) = tokio::join!(
        app.post_json("/api/v1/bookings", &long),
        app.post_json("/api/v1/bookings", &short),
    );
    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    assert_eq!(app.gateway.charges.lock().unwrap().len(), 1);
    let stored = app.stored_bookings().await;
    assert_eq!(stored.iter().filter(|b| b["slot"] == "2:00 PM").count(), 1);
}

fn spawn_online_booking(app: &TestApp, body: Value) -> tokio::task::JoinHandle<StatusCode> {
    let router = app.router.clone();
    tokio::spawn(async move {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        router.oneshot(request).await.unwrap().status()
    })
}

#[tokio::test]
async fn test_slow_payment_holds_the_slot_without_blocking_admin_writes() {
    let app = TestApp::new().await;
    let date = app.future_weekday();
    app.gateway.hold_charges.store(true, Ordering::SeqCst);

    let pending = spawn_online_booking(&app, online_booking(&date.to_string(), "10:00 AM", 60, 5000));
    timeout(Duration::from_secs(5), app.gateway.charge_started.notified()).await.unwrap();

    // The charge is still in flight; other writers must not wait for it.
    let toggle = json!({"date": date, "slot": "3:00 PM", "block": true});
    let res = timeout(
        Duration::from_secs(2),
        app.admin("POST", "/api/v1/admin/blocked-times/toggle", Some(&toggle)),
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(!app.available_slots(date, 60).await.contains(&"10:00 AM".to_string()));
    let res = app.admin("GET", &format!("/api/v1/admin/bookings?date={}", date), None).await;
    let listed = parse_body(res).await;
    assert_eq!(listed[0]["status"], "PENDING");
    let id = listed[0]["id"].as_str().unwrap().to_string();

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "full"})),
    ).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    app.gateway.charge_released.notify_one();
    assert_eq!(pending.await.unwrap(), StatusCode::CREATED);

    let res = app.admin("GET", &format!("/api/v1/admin/bookings?date={}", date), None).await;
    let listed = parse_body(res).await;
    assert_eq!(listed[0]["status"], "CONFIRMED");
    assert_eq!(listed[0]["deposit_paid_cents"], 2500);
}

#[tokio::test]
async fn test_booking_deleted_while_paying_is_refunded() {
    let app = TestApp::new().await;
    let date = app.future_weekday();
    app.gateway.hold_charges.store(true, Ordering::SeqCst);

    let pending = spawn_online_booking(&app, online_booking(&date.to_string(), "11:00 AM", 60, 8000));
    timeout(Duration::from_secs(5), app.gateway.charge_started.notified()).await.unwrap();

    let res = app.admin("GET", "/api/v1/admin/bookings", None).await;
    let id = parse_body(res).await[0]["id"].as_str().unwrap().to_string();
    let res = app.admin("DELETE", &format!("/api/v1/admin/bookings/{}", id), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    app.gateway.charge_released.notify_one();
    assert_eq!(pending.await.unwrap(), StatusCode::CONFLICT);

    let refunds = app.gateway.refunds.lock().unwrap().clone();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount_cents, 4000);
    assert!(app.stored_bookings().await.is_empty());
}

#[tokio::test]
async fn test_saved_cards_are_listed_by_email() {
    let app = TestApp::new().await;
    let card = |id: &str, enabled: bool| SavedCard {
        id: id.to_string(),
        last4: Some("4242".to_string()),
        card_brand: Some("VISA".to_string()),
        exp_month: Some(8),
        exp_year: Some(2030),
        enabled,
    };
    {
        let mut cards = app.gateway.cards_on_file.lock().unwrap();
        cards.push(("maya@example.com".to_string(), card("ccof_live", true)));
        cards.push(("maya@example.com".to_string(), card("ccof_disabled", false)));
        cards.push(("other@example.com".to_string(), card("ccof_other", true)));
    }

    let res = app.post_json("/api/v1/customer-cards", &json!({"email": " Maya@Example.com "})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = parse_body(res).await;
    let cards = body["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["id"], "ccof_live");
    assert_eq!(cards[0]["last4"], "4242");

    let res = app.post_json("/api/v1/customer-cards", &json!({"email": "nobody@example.com"})).await;
    assert_eq!(parse_body(res).await["cards"], json!([]));
}

#[tokio::test]
async fn test_admin_booking_payment_states() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let cases = [
        ("9:00 AM", json!({"source": "manual", "payment_status": "paid-full"}), "full", 9001, "manual"),
        ("10:00 AM", json!({"source": "manual", "payment_status": "paid-deposit"}), "deposit", 4501, "manual"),
        ("11:00 AM", json!({"source": "manual", "payment_status": "unpaid"}), "manual", 0, "manual"),
        ("12:00 PM", json!({"source": "manual", "payment_status": "comp"}), "comp", 9001, "complimentary"),
        ("1:00 PM", json!({"source": "in-person", "payment_method": "cash"}), "full", 9001, "cash"),
    ];

    for (slot, payment, payment_type, deposit, method) in cases {
        let res = app.admin("POST", "/api/v1/admin/bookings", Some(&admin_booking(&date, slot, payment))).await;
        assert_eq!(res.status(), StatusCode::CREATED, "slot {}", slot);
        let booking = parse_body(res).await;
        assert_eq!(booking["payment"]["payment_type"], payment_type);
        assert_eq!(booking["deposit_paid_cents"], deposit);
        assert_eq!(booking["payment"]["method"], method);
        assert!(booking["payment"]["payment_id"].is_null());
    }

    assert!(app.gateway.charges.lock().unwrap().is_empty());

    let res = app.admin("GET", &format!("/api/v1/admin/bookings?date={}", date), None).await;
    let listed = parse_body(res).await;
    let slots: Vec<&str> = listed.as_array().unwrap().iter().map(|b| b["slot"].as_str().unwrap()).collect();
    assert_eq!(slots, vec!["9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM"]);
}

#[tokio::test]
async fn test_delete_frees_every_slot_of_the_booking() {
    let app = TestApp::new().await;
    let date = app.future_weekday();
    let before = app.available_slots(date, 60).await;

    let res = app.post_json("/api/v1/bookings", &online_booking(&date.to_string(), "11:00 AM", 150, 12000)).await;
    let booking = parse_body(res).await;
    let id = booking["id"].as_str().unwrap();
    assert_eq!(app.available_slots(date, 60).await.len(), before.len() - 3);

    let res = app.admin("DELETE", &format!("/api/v1/admin/bookings/{}", id), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let freed = parse_body(res).await;
    assert_eq!(freed["slots_freed"], 3);

    assert_eq!(app.available_slots(date, 60).await, before);
    assert!(app.stored_bookings().await.is_empty());

    let res = app.admin("DELETE", &format!("/api/v1/admin/bookings/{}", id), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_marker_id_cannot_be_deleted_on_its_own() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "11:00 AM", 120, 12000)).await;
    let booking = parse_body(res).await;
    let marker_id = format!("{}-blocked-1", booking["id"].as_str().unwrap());

    let res = app.admin("DELETE", &format!("/api/v1/admin/bookings/{}", marker_id), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.stored_bookings().await.len(), 2);
}

#[tokio::test]
async fn test_partial_refund_then_second_refund_is_rejected() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 10000)).await;
    let booking = parse_body(res).await;
    let id = booking["id"].as_str().unwrap();

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "partial", "reason": "late cancel"})),
    ).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = parse_body(res).await;
    assert_eq!(outcome["refund_amount_cents"], 2500);
    assert_eq!(outcome["refund_id"], "ref_1");
    assert_eq!(outcome["booking"]["refund_status"], "partial");
    assert_eq!(outcome["booking"]["remaining_balance_cents"], 7500);
    assert_eq!(outcome["booking"]["status"], "CONFIRMED");

    let refunds = app.gateway.refunds.lock().unwrap().clone();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount_cents, 2500);

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "full"})),
    ).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(app.gateway.refunds.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_full_refund_cancels_but_keeps_slots_held() {
    let app = TestApp::new().await;
    let date = app.future_weekday();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date.to_string(), "10:00 AM", 60, 10000)).await;
    let id = parse_body(res).await["id"].as_str().unwrap().to_string();

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "full"})),
    ).await;
    let outcome = parse_body(res).await;
    assert_eq!(outcome["booking"]["status"], "CANCELLED");
    assert_eq!(outcome["booking"]["refund_amount_cents"], 5000);
    assert_eq!(outcome["booking"]["remaining_balance_cents"], 10000);

    assert!(!app.available_slots(date, 60).await.contains(&"10:00 AM".to_string()));
}

#[tokio::test]
async fn test_refund_of_manual_booking_stays_local() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.admin(
        "POST",
        "/api/v1/admin/bookings",
        Some(&admin_booking(&date, "3:00 PM", json!({"source": "manual", "payment_status": "paid-full"}))),
    ).await;
    let id = parse_body(res).await["id"].as_str().unwrap().to_string();

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "full"})),
    ).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = parse_body(res).await;
    assert!(outcome["refund_id"].is_null());
    assert_eq!(outcome["refund_amount_cents"], 9001);
    assert!(app.gateway.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_refund_type_is_rejected() {
    let app = TestApp::new().await;
    let date = app.future_weekday().to_string();

    let res = app.post_json("/api/v1/bookings", &online_booking(&date, "10:00 AM", 60, 10000)).await;
    let id = parse_body(res).await["id"].as_str().unwrap().to_string();

    let res = app.admin(
        "POST",
        &format!("/api/v1/admin/bookings/{}/refund", id),
        Some(&json!({"refund_type": "most"})),
    ).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_admin_routes_require_the_token() {
    let app = TestApp::new().await;

    let res = app.get("/api/v1/admin/bookings").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.router.clone().oneshot(
        Request::builder()
            .uri("/api/v1/admin/today")
            .header(header::AUTHORIZATION, "Bearer wrong-token")
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.admin("GET", "/api/v1/admin/today", None).await;
    assert_eq!(res.status(), StatusCode::OK);
}
