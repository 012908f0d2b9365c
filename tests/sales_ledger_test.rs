mod common;

use assert_matches::assert_matches;
use common::{days_ago, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockcast::{
    auth::Actor,
    errors::ServiceError,
    services::sales::{EditSaleRequest, RecordSaleRequest},
};
use uuid::Uuid;

fn sale_of(product_id: Uuid, quantity: Decimal, unit_price: Decimal) -> RecordSaleRequest {
    RecordSaleRequest {
        product_id,
        quantity,
        unit_price,
        notes: None,
        sale_date: None,
        sale_time: None,
    }
}

fn edit_of(product_id: Uuid, quantity: Decimal, unit_price: Decimal) -> EditSaleRequest {
    EditSaleRequest {
        product_id,
        quantity,
        unit_price,
        notes: None,
    }
}

async fn stock_of(app: &TestApp, actor: &Actor, product_id: Uuid) -> Decimal {
    app.services
        .inventory
        .get_balance(actor, product_id)
        .await
        .unwrap()
        .map(|b| b.quantity)
        .unwrap_or_default()
}

#[tokio::test]
async fn recording_a_sale_deducts_stock_and_prices_the_total() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&actor, "Espresso", dec!(100)).await;

    let sale = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(20), dec!(2.50)))
        .await
        .unwrap();

    assert_eq!(sale.quantity, dec!(20));
    assert_eq!(sale.total_amount, dec!(50));
    assert_eq!(sale.sale_date, days_ago(0));
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(80));
}

#[tokio::test]
async fn oversell_is_rejected_with_the_available_quantity() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&actor, "Latte", dec!(10)).await;

    let err = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(10.5), dec!(3)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { available } if available == dec!(10));

    // Selling exactly what is on hand is allowed.
    app.services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(10), dec!(3)))
        .await
        .unwrap();
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(0));

    let err = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(1), dec!(3)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { available } if available == dec!(0));
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&actor, "Mocha", dec!(10)).await;

    for quantity in [dec!(0), dec!(-3)] {
        let err = app
            .services
            .sales
            .record_sale(&actor, sale_of(product.id, quantity, dec!(3)))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidQuantity(_));
    }

    let err = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(1), dec!(-0.5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn deleting_a_sale_restores_the_stock() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&actor, "Flat White", dec!(100)).await;

    let sale = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(20), dec!(4)))
        .await
        .unwrap();
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(80));

    app.services.sales.delete_sale(&actor, sale.id).await.unwrap();

    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(100));
    assert!(app.services.sales.get_sales(&actor, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn editing_quantity_moves_stock_by_the_difference() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&actor, "Cortado", dec!(100)).await;

    let sale = app
        .services
        .sales
        .record_sale(&actor, sale_of(product.id, dec!(20), dec!(5)))
        .await
        .unwrap();
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(80));

    let grown = app
        .services
        .sales
        .edit_sale(&actor, sale.id, edit_of(product.id, dec!(30), dec!(5)))
        .await
        .unwrap();
    assert_eq!(grown.total_amount, dec!(150));
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(70));

    let shrunk = app
        .services
        .sales
        .edit_sale(&actor, sale.id, edit_of(product.id, dec!(5), dec!(5)))
        .await
        .unwrap();
    assert_eq!(shrunk.total_amount, dec!(25));
    assert_eq!(stock_of(&app, &actor, product.id).await, dec!(95));
}

#[tokio::test]
async fn editing_the_product_moves_stock_between_balances() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let original = app.seed_stocked_product(&actor, "Beans A", dec!(50)).await;
    let replacement = app.seed_stocked_product(&actor, "Beans B", dec!(10)).await;

    let sale = app
        .services
        .sales
        .record_sale(&actor, sale_of(original.id, dec!(40), dec!(5)))
        .await
        .unwrap();
    assert_eq!(stock_of(&app, &actor, original.id).await, dec!(10));

    let moved = app
        .services
        .sales
        .edit_sale(&actor, sale.id, edit_of(replacement.id, dec!(8), dec!(5)))
        .await
        .unwrap();

    assert_eq!(moved.product_id, replacement.id);
    assert_eq!(stock_of(&app, &actor, original.id).await, dec!(50));
    assert_eq!(stock_of(&app, &actor, replacement.id).await, dec!(2));
}

// The restore runs inside the same transaction as the re-deduction, so a
// failed edit must leave both balances and the sale row exactly as they were.
#[tokio::test]
async fn a_failed_edit_leaves_everything_untouched() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    let original = app.seed_stocked_product(&actor, "Beans A", dec!(50)).await;
    let replacement = app.seed_stocked_product(&actor, "Beans B", dec!(5)).await;

    let sale = app
        .services
        .sales
        .record_sale(&actor, sale_of(original.id, dec!(40), dec!(5)))
        .await
        .unwrap();

    let err = app
        .services
        .sales
        .edit_sale(&actor, sale.id, edit_of(replacement.id, dec!(8), dec!(5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { available } if available == dec!(5));

    assert_eq!(stock_of(&app, &actor, original.id).await, dec!(10));
    assert_eq!(stock_of(&app, &actor, replacement.id).await, dec!(5));

    let unchanged = &app.services.sales.get_sales(&actor, None).await.unwrap()[0];
    assert_eq!(unchanged.sale.product_id, original.id);
    assert_eq!(unchanged.sale.quantity, dec!(40));
    assert_eq!(unchanged.sale.total_amount, dec!(200));
}

#[tokio::test]
async fn back_dated_writes_need_an_elevated_actor() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let user = Actor::user(owner);
    let product = app.seed_stocked_product(&user, "Doppio", dec!(100)).await;

    let err = app
        .services
        .sales
        .record_sale(
            &user,
            RecordSaleRequest {
                sale_date: Some(days_ago(1)),
                ..sale_of(product.id, dec!(2), dec!(5))
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PermissionDenied(_));

    let sale = app
        .record_sale_on(owner, product.id, days_ago(1), dec!(2))
        .await;

    let err = app
        .services
        .sales
        .edit_sale(&user, sale.id, edit_of(product.id, dec!(3), dec!(5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PermissionDenied(_));

    let err = app.services.sales.delete_sale(&user, sale.id).await.unwrap_err();
    assert_matches!(err, ServiceError::PermissionDenied(_));

    let elevated = Actor::elevated(owner);
    app.services.sales.delete_sale(&elevated, sale.id).await.unwrap();
    assert_eq!(stock_of(&app, &user, product.id).await, dec!(100));
}

#[tokio::test]
async fn listings_are_newest_first_and_range_filtered() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app.seed_stocked_product(&actor, "Ristretto", dec!(100)).await;

    app.record_sale_on(owner, product.id, days_ago(3), dec!(10)).await;
    app.record_sale_on(owner, product.id, days_ago(1), dec!(10)).await;
    app.record_sale_on(owner, product.id, days_ago(0), dec!(10)).await;

    let all = app.services.sales.get_sales(&actor, None).await.unwrap();
    let dates: Vec<_> = all.iter().map(|s| s.sale.sale_date).collect();
    assert_eq!(dates, vec![days_ago(0), days_ago(1), days_ago(3)]);
    assert!(all.iter().all(|s| s.product.name == "Ristretto"));

    let recent = app
        .services
        .sales
        .get_sales(&actor, Some((days_ago(2), days_ago(0))))
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn owners_cannot_record_sales_on_foreign_products() {
    let app = TestApp::new().await;
    let alice = Actor::user(Uuid::new_v4());
    let mallory = Actor::user(Uuid::new_v4());
    let product = app.seed_stocked_product(&alice, "Affogato", dec!(30)).await;

    let err = app
        .services
        .sales
        .record_sale(&mallory, sale_of(product.id, dec!(1), dec!(5)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
