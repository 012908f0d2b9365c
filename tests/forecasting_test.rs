mod common;

use chrono::{NaiveDate, Utc};
use common::{days_ago, tomorrow, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use stockcast::{auth::Actor, entities::forecast, ml::demand::ProductionPriority};
use uuid::Uuid;

async fn seed_forecast(
    app: &TestApp,
    owner: Uuid,
    product_id: Uuid,
    date: NaiveDate,
    predicted: i32,
) -> forecast::Model {
    forecast::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner),
        product_id: Set(product_id),
        forecast_date: Set(date),
        predicted_quantity: Set(predicted),
        confidence_score: Set(0.8),
        actual_quantity: Set(None),
        model_version: Set("ma7-trend-weekday/1".to_string()),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(app.db.as_ref())
    .await
    .unwrap()
}

#[tokio::test]
async fn too_little_history_skips_the_product() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app
        .seed_stocked_product(&actor, "Croissant", dec!(1000))
        .await;

    for n in 1..=6 {
        app.record_sale_on(owner, product.id, days_ago(n), dec!(10))
            .await;
    }
    // Two sales on the same day still count as one day of history.
    app.record_sale_on(owner, product.id, days_ago(1), dec!(4))
        .await;

    let summary = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(summary.generated, 0);
    assert_eq!(summary.skipped, 1);
    assert!(summary.forecasts.is_empty());

    // A seventh distinct day crosses the floor.
    app.record_sale_on(owner, product.id, days_ago(7), dec!(10))
        .await;
    let summary = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.forecasts.len(), 1);
}

#[tokio::test]
async fn a_second_run_reuses_the_existing_rows() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app
        .seed_stocked_product(&actor, "Baguette", dec!(1000))
        .await;
    for n in 1..=7 {
        app.record_sale_on(owner, product.id, days_ago(n), dec!(10))
            .await;
    }

    let first = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(first.generated, 1);

    let second = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(second.generated, 0);
    assert_eq!(second.forecasts.len(), 1);
    assert_eq!(second.forecasts[0].id, first.forecasts[0].id);
}

#[tokio::test]
async fn trending_history_predicts_the_adjusted_average() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app
        .seed_stocked_product(&actor, "Sourdough", dec!(1000))
        .await;

    // None of these days falls on tomorrow's weekday, so the prediction is
    // the trend-adjusted average alone.
    let history = [
        (12, dec!(40)),
        (11, dec!(42)),
        (10, dec!(38)),
        (9, dec!(45)),
        (8, dec!(50)),
        (7, dec!(48)),
        (5, dec!(52)),
        (4, dec!(55)),
    ];
    for (n, quantity) in history {
        app.record_sale_on(owner, product.id, days_ago(n), quantity)
            .await;
    }

    let summary = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(summary.generated, 1);

    let forecast = &summary.forecasts[0];
    assert_eq!(forecast.forecast_date, tomorrow());
    assert_eq!(forecast.predicted_quantity, 50);
    assert_eq!(forecast.confidence_score, 0.76);
    assert_eq!(forecast.model_version, "ma7-trend-weekday/1");
    assert!(forecast.actual_quantity.is_none());
}

#[tokio::test]
async fn steady_history_predicts_the_average_with_full_confidence() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app.seed_stocked_product(&actor, "Rye", dec!(200)).await;
    for n in 1..=10 {
        app.record_sale_on(owner, product.id, days_ago(n), dec!(10))
            .await;
    }

    let summary = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();

    let forecast = &summary.forecasts[0];
    assert_eq!(forecast.predicted_quantity, 10);
    assert_eq!(forecast.confidence_score, 1.0);
}

#[tokio::test]
async fn deactivated_products_are_not_forecast() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let active = app.seed_stocked_product(&actor, "Spelt", dec!(500)).await;
    let retired = app.seed_stocked_product(&actor, "Kamut", dec!(500)).await;

    for n in 1..=7 {
        app.record_sale_on(owner, active.id, days_ago(n), dec!(10))
            .await;
        app.record_sale_on(owner, retired.id, days_ago(n), dec!(10))
            .await;
    }
    app.services
        .products
        .deactivate_product(&actor, retired.id)
        .await
        .unwrap();

    let summary = app
        .services
        .forecasting
        .generate_for_tomorrow(&actor)
        .await
        .unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.forecasts[0].product_id, active.id);
}

#[tokio::test]
async fn backfill_scores_past_forecasts_against_real_sales() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);
    let product = app.seed_stocked_product(&actor, "Ciabatta", dec!(100)).await;

    app.record_sale_on(owner, product.id, days_ago(1), dec!(5))
        .await;
    app.record_sale_on(owner, product.id, days_ago(1), dec!(3))
        .await;
    seed_forecast(&app, owner, product.id, days_ago(1), 10).await;
    seed_forecast(&app, owner, product.id, days_ago(2), 5).await;

    let updated = app
        .services
        .forecasting
        .backfill_actuals(&actor)
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let scored = app
        .services
        .forecasting
        .get_for_date(&actor, days_ago(1))
        .await
        .unwrap();
    assert_eq!(scored[0].actual_quantity, Some(8));

    let unsold = app
        .services
        .forecasting
        .get_for_date(&actor, days_ago(2))
        .await
        .unwrap();
    assert_eq!(unsold[0].actual_quantity, Some(0));

    // Already-scored rows are left alone.
    assert_eq!(
        app.services
            .forecasting
            .backfill_actuals(&actor)
            .await
            .unwrap(),
        0
    );

    // Only the day with real sales scores: |10 - 8| / 8 = 25% error.
    let accuracy = app.services.forecasting.accuracy(&actor, 7).await.unwrap();
    assert_eq!(accuracy, 75.0);
}

#[tokio::test]
async fn accuracy_is_zero_without_scored_rows() {
    let app = TestApp::new().await;
    let actor = Actor::user(Uuid::new_v4());
    assert_eq!(app.services.forecasting.accuracy(&actor, 7).await.unwrap(), 0.0);
}

#[tokio::test]
async fn production_plan_orders_by_urgency() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let actor = Actor::user(owner);

    let out_of_stock = app.seed_product(&actor, "Panettone").await;
    let critical = app.seed_stocked_product(&actor, "Stollen", dec!(2)).await;
    let watch = app.seed_stocked_product(&actor, "Kugelhopf", dec!(5)).await;
    let covered = app.seed_stocked_product(&actor, "Babka", dec!(12)).await;

    seed_forecast(&app, owner, out_of_stock.id, tomorrow(), 20).await;
    seed_forecast(&app, owner, critical.id, tomorrow(), 10).await;
    seed_forecast(&app, owner, watch.id, tomorrow(), 10).await;
    seed_forecast(&app, owner, covered.id, tomorrow(), 10).await;

    let plan = app
        .services
        .forecasting
        .production_plan(&actor, tomorrow())
        .await
        .unwrap();

    let order: Vec<&str> = plan.iter().map(|e| e.product.name.as_str()).collect();
    assert_eq!(order, vec!["Panettone", "Stollen", "Kugelhopf", "Babka"]);

    assert_eq!(plan[0].priority, ProductionPriority::High);
    assert_eq!(plan[1].priority, ProductionPriority::High);
    assert_eq!(plan[2].priority, ProductionPriority::Medium);
    assert_eq!(plan[3].priority, ProductionPriority::Low);

    // A product with no balance row has zero stock and is low by definition.
    assert!(plan[0].is_low_stock);
    assert_eq!(plan[0].current_stock, dec!(0));
    assert!(!plan[1].is_low_stock);
}
