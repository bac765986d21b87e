//! Invoice lifecycle and lookup integration tests.

mod common;

use common::TestApp;
use fiscal_service::models::{AuditAction, AuditSeverity};
use uuid::Uuid;

#[tokio::test]
async fn invoice_moves_through_submission_to_acceptance() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;
    let id = invoice["id"].as_str().unwrap();

    let response = app.advance(id, "SUBMITTED").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "SUBMITTED");

    let response = app.advance(id, "ACCEPTED").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ACCEPTED");

    // Sealed fields survive the lifecycle.
    assert_eq!(body["invoiceHash"], invoice["invoiceHash"]);
    assert_eq!(body["canonicalPayload"], invoice["canonicalPayload"]);
    assert_eq!(body["grossAmount"], invoice["grossAmount"]);
}

#[tokio::test]
async fn accepted_invoice_cannot_be_cancelled() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;
    let id = invoice["id"].as_str().unwrap();

    app.advance(id, "SUBMITTED").await;
    app.advance(id, "ACCEPTED").await;
    let response = app.advance(id, "CANCELLED").await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn invoice_cannot_move_back_to_created() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;

    let response = app
        .advance(invoice["id"].as_str().unwrap(), "CREATED")
        .await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn submission_cannot_be_skipped() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;

    let response = app
        .advance(invoice["id"].as_str().unwrap(), "ACCEPTED")
        .await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn cancellation_is_audited_as_high_severity() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;

    let response = app
        .advance(invoice["id"].as_str().unwrap(), "CANCELLED")
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let events = app.store.settled_audit_events(2).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].action, AuditAction::StatusChange);
    assert_eq!(events[1].severity, AuditSeverity::High);
    assert_eq!(events[1].actor_id.as_deref(), Some("ops-1"));
}

#[tokio::test]
async fn advancing_unknown_invoice_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.advance(&Uuid::new_v4().to_string(), "SUBMITTED").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn invoice_is_found_by_id_sale_and_number() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "20.00");
    let invoice = app.issue_ok(sale_id, shop_id).await;
    let number = invoice["invoiceNumber"].as_str().unwrap();

    for path in [
        format!("/api/invoices/{}", invoice["id"].as_str().unwrap()),
        format!("/api/sales/{}/invoice", sale_id),
        format!("/api/invoice-numbers/{}", number),
    ] {
        let response = app
            .client
            .get(app.url(&path))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "{}", path);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["invoiceNumber"], number);
    }
}

#[tokio::test]
async fn missing_invoice_lookups_are_not_found() {
    let app = TestApp::spawn().await;

    for path in [
        format!("/api/invoices/{}", Uuid::new_v4()),
        format!("/api/sales/{}/invoice", Uuid::new_v4()),
        "/api/invoice-numbers/INV-nope".to_string(),
    ] {
        let response = app
            .client
            .get(app.url(&path))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 404, "{}", path);
    }
}

#[tokio::test]
async fn list_pages_through_shop_invoices() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let other_shop = app.seed_shop();
    for _ in 0..3 {
        let sale_id = app.seed_sale(shop_id, 1, "1.00");
        app.issue_ok(sale_id, shop_id).await;
    }
    let other_sale = app.seed_sale(other_shop, 1, "1.00");
    app.issue_ok(other_sale, other_shop).await;

    let response = app
        .client
        .get(app.url("/api/invoices"))
        .query(&[("shopId", shop_id.to_string()), ("pageSize", "2".to_string())])
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let first: serde_json::Value = response.json().await.unwrap();
    assert_eq!(first["invoices"].as_array().unwrap().len(), 2);
    let token = first["nextPageToken"].as_str().unwrap().to_string();

    let response = app
        .client
        .get(app.url("/api/invoices"))
        .query(&[
            ("shopId", shop_id.to_string()),
            ("pageSize", "2".to_string()),
            ("pageToken", token),
        ])
        .send()
        .await
        .expect("Failed to execute request");
    let second: serde_json::Value = response.json().await.unwrap();
    let rest = second["invoices"].as_array().unwrap();
    assert_eq!(rest.len(), 1);
    assert!(second.get("nextPageToken").is_none());
    assert_eq!(rest[0]["shopId"], shop_id.to_string());
}

#[tokio::test]
async fn oversized_page_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/invoices"))
        .query(&[("pageSize", "500")])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}
