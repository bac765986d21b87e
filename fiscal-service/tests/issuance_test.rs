//! Invoice issuance integration tests.

mod common;

use common::{dec, TestApp, TEST_MERCHANT_TIN, TEST_VERIFICATION_URL};
use fiscal_service::models::{AuditAction, SaleItem};
use uuid::Uuid;

#[tokio::test]
async fn issue_invoice_computes_taxes_and_seals() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 2, "250.00");

    let body = app.issue_ok(sale_id, shop_id).await;

    assert_eq!(body["netAmount"], "500.00");
    assert_eq!(body["vatAmount"], "75.00");
    assert_eq!(body["surtaxAmount"], "5.00");
    assert_eq!(body["grossAmount"], "580.00");
    assert_eq!(body["status"], "QR_GENERATED");
    assert_eq!(body["saleId"], sale_id.to_string());
    assert_eq!(body["shopId"], shop_id.to_string());

    let number = body["invoiceNumber"].as_str().unwrap();
    assert!(number.starts_with(&format!("INV-{}-", shop_id)));
    assert!(number.ends_with("-000001"));

    assert!(body["signature"].as_str().unwrap().starts_with("dummy:"));
    assert_eq!(body["invoiceHash"].as_str().unwrap().len(), 44);

    let canonical = body["canonicalPayload"].as_str().unwrap();
    assert!(canonical.contains("\"grossAmount\":580.00"));
    assert!(canonical.contains(number));

    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["productName"], "Espresso Beans 1kg");
    assert_eq!(lines[0]["lineTotal"], "500.00");
}

#[tokio::test]
async fn qr_payload_points_at_verification_url() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "19.99");

    let body = app.issue_ok(sale_id, shop_id).await;
    let number = body["invoiceNumber"].as_str().unwrap();
    let qr = &body["qrPayload"];

    assert_eq!(qr["invoiceNumber"], number);
    assert_eq!(qr["invoiceHash"], body["invoiceHash"]);
    assert_eq!(qr["merchantTin"], TEST_MERCHANT_TIN);
    assert_eq!(
        qr["verificationUrl"],
        format!("{}/{}", TEST_VERIFICATION_URL, number)
    );
}

#[tokio::test]
async fn second_issuance_for_same_sale_conflicts() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "10.00");

    app.issue_ok(sale_id, shop_id).await;
    let response = app.issue(sale_id, shop_id).await;

    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(app.store.invoice_count().unwrap(), 1);
}

#[tokio::test]
async fn concurrent_issuance_yields_one_invoice() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 3, "4.50");

    let attempts = (0..8).map(|_| app.issue(sale_id, shop_id));
    let responses = futures::future::join_all(attempts).await;

    let created = responses
        .iter()
        .filter(|r| r.status().as_u16() == 201)
        .count();
    let conflicts = responses
        .iter()
        .filter(|r| r.status().as_u16() == 409)
        .count();

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(app.store.invoice_count().unwrap(), 1);
}

#[tokio::test]
async fn numbers_increase_per_shop() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let first_sale = app.seed_sale(shop_id, 1, "1.00");
    let second_sale = app.seed_sale(shop_id, 1, "2.00");

    let first = app.issue_ok(first_sale, shop_id).await;
    let second = app.issue_ok(second_sale, shop_id).await;

    assert!(first["invoiceNumber"].as_str().unwrap().ends_with("-000001"));
    assert!(second["invoiceNumber"].as_str().unwrap().ends_with("-000002"));
}

#[tokio::test]
async fn unknown_sale_is_not_found() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();

    let response = app.issue(Uuid::new_v4(), shop_id).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn unknown_shop_is_not_found() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "1.00");

    let response = app.issue(sale_id, Uuid::new_v4()).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn sale_of_another_shop_is_rejected() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let other_shop = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "1.00");

    let response = app.issue(sale_id, other_shop).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.store.invoice_count().unwrap(), 0);
}

#[tokio::test]
async fn inconsistent_sale_total_is_unprocessable() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let product_id = app.seed_product("Milk");
    let sale_id = app.seed_sale_with_items(
        shop_id,
        dec("99.00"),
        vec![SaleItem {
            product_id,
            quantity: 2,
            unit_price: dec("1.20"),
            total_price: dec("2.40"),
        }],
    );

    let response = app.issue(sale_id, shop_id).await;

    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn sub_cent_sale_is_unprocessable_and_not_rounded() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let product_id = app.seed_product("Sample");
    let sale_id = app.seed_sale_with_items(
        shop_id,
        dec("0.010"),
        vec![SaleItem {
            product_id,
            quantity: 2,
            unit_price: dec("0.005"),
            total_price: dec("0.010"),
        }],
    );

    let response = app.issue(sale_id, shop_id).await;

    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.store.invoice_count().unwrap(), 0);
}

#[tokio::test]
async fn oversized_sale_is_unprocessable() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let product_id = app.seed_product("Gold bar");
    let huge = dec("30000000000000000000000000000");
    let sale_id = app.seed_sale_with_items(
        shop_id,
        huge,
        vec![SaleItem {
            product_id,
            quantity: 3,
            unit_price: huge,
            total_price: huge,
        }],
    );

    let response = app.issue(sale_id, shop_id).await;

    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.store.invoice_count().unwrap(), 0);
}

#[tokio::test]
async fn two_line_sale_is_issued_once() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let mugs = app.seed_product("Mug");
    let kettle = app.seed_product("Kettle");
    let sale_id = app.seed_sale_with_items(
        shop_id,
        dec("500.00"),
        vec![
            SaleItem {
                product_id: mugs,
                quantity: 2,
                unit_price: dec("100.00"),
                total_price: dec("200.00"),
            },
            SaleItem {
                product_id: kettle,
                quantity: 1,
                unit_price: dec("300.00"),
                total_price: dec("300.00"),
            },
        ],
    );

    let body = app.issue_ok(sale_id, shop_id).await;

    assert_eq!(body["netAmount"], "500.00");
    assert_eq!(body["vatAmount"], "75.00");
    assert_eq!(body["surtaxAmount"], "5.00");
    assert_eq!(body["grossAmount"], "580.00");
    assert_eq!(body["status"], "QR_GENERATED");

    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["productName"], "Mug");
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(lines[0]["unitPrice"], "100.00");
    assert_eq!(lines[0]["lineTotal"], "200.00");
    assert_eq!(lines[1]["productName"], "Kettle");
    assert_eq!(lines[1]["lineTotal"], "300.00");

    let second = app.issue(sale_id, shop_id).await;
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(app.store.invoice_count().unwrap(), 1);
}

#[tokio::test]
async fn unknown_product_gets_placeholder_name() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale_with_items(
        shop_id,
        dec("3.00"),
        vec![SaleItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: dec("3.00"),
            total_price: dec("3.00"),
        }],
    );

    let body = app.issue_ok(sale_id, shop_id).await;

    assert_eq!(body["lines"][0]["productName"], "Unknown");
}

#[tokio::test]
async fn issuance_is_audited_with_actor() {
    let app = TestApp::spawn().await;
    let shop_id = app.seed_shop();
    let sale_id = app.seed_sale(shop_id, 1, "5.00");

    let body = app.issue_ok(sale_id, shop_id).await;

    let events = app.store.settled_audit_events(1).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Create);
    assert_eq!(events[0].entity_id.to_string(), body["id"].as_str().unwrap());
    assert_eq!(events[0].actor_id.as_deref(), Some("cashier-7"));
    assert_eq!(events[0].actor_role.as_deref(), Some("cashier"));
    assert!(events[0].request_id.is_some());
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/invoices"))
        .json(&serde_json::json!({ "saleId": "not-a-uuid" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_client_error());
}
