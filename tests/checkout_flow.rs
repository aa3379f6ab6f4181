//! Database-backed checkout flows. Run with a Postgres `DATABASE_URL` and
//! `cargo test -- --ignored`.

mod common;

use std::time::Duration;

use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use repustore::domain::aggregates::{CartChange, CartStatus, NewProduct, OrderStatus, Product, ProductPatch, User};
use repustore::payments::webhook::Notification;
use repustore::repository::{carts, categories, orders, products, reviews, users};
use repustore::services::cart::{self as cart_service, CookieUpdate};
use repustore::services::checkout::{self, Settlement};
use repustore::services::{orders as order_service, products as product_service};
use repustore::{AppError, AppState};

use common::{app_with_pool, payment};

async fn seed_product(state: &AppState, stock: u32) -> Product {
    let category = categories::insert(&state.db, &format!("Filtros {}", Uuid::new_v4())).await.unwrap();
    let product = Product::create(NewProduct {
        name: format!("Filtro de aceite {}", Uuid::new_v4()),
        description: None,
        price: dec!(1500),
        stock,
        img_url: None,
        year: Some(2015),
        brand: "Fram".into(),
        model: "Gol".into(),
        engine: "1.6".into(),
        category_id: category.id,
    })
    .unwrap();
    products::insert(&state.db, &product).await.unwrap()
}

async fn seed_user(state: &AppState) -> User {
    let now = chrono::Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        name: "Juan Perez".into(),
        email: format!("{}@repustore.test", Uuid::new_v4()),
        password_hash: String::new(),
        phone: None,
        country: Some("Argentina".into()),
        address: None,
        city: Some("Rosario".into()),
        img_url: None,
        is_admin: false,
        is_super_admin: false,
        is_banned: false,
        is_verified: true,
        verification_token: None,
        created_at: now,
        updated_at: now,
    };
    users::insert(&state.db, &user).await.unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_approved_payment_creates_one_order(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 5).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 2).await.unwrap();
    let preference = checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    assert_eq!(preference.preference_id, "pref-1");
    assert_eq!(app.gateway.preferences.lock().unwrap()[0].external_reference, cart.id().to_string());

    let paid = payment("pay-1", "approved", &cart.id().to_string());
    let first = checkout::settle_payment(state, &paid).await.unwrap();
    let Settlement::OrderCreated(order_id) = first else { panic!("expected an order, got {first:?}") };
    let again = checkout::settle_payment(state, &paid).await.unwrap();
    assert_eq!(again, Settlement::AlreadyProcessed(order_id));

    let order = orders::find(&state.db, order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::OnPreparation);
    assert_eq!(order.total(), dec!(3000));
    assert_eq!(order.payment().preference_id.as_deref(), Some("pref-1"));
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 3);
    assert!(carts::find(&state.db, cart.id()).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_rejected_payment_reopens_cart(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 5).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 1).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    assert_eq!(carts::find(&state.db, cart.id()).await.unwrap().unwrap().status(), CartStatus::Pending);

    let outcome = checkout::settle_payment(state, &payment("pay-2", "rejected", &cart.id().to_string())).await.unwrap();
    assert_eq!(outcome, Settlement::CartReopened);
    let cart = carts::find(&state.db, cart.id()).await.unwrap().unwrap();
    assert_eq!(cart.status(), CartStatus::Active);
    assert_eq!(cart.preference_id(), None);
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 5);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_stock_conflict_keeps_cart_flagged(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 2).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 2).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    products::set_stock(&state.db, product.id, 1).await.unwrap();

    let outcome = checkout::settle_payment(state, &payment("pay-3", "approved", &cart.id().to_string())).await.unwrap();
    assert_eq!(outcome, Settlement::StockConflict);
    let cart = carts::find(&state.db, cart.id()).await.unwrap().unwrap();
    assert_eq!(cart.status(), CartStatus::Pending);
    assert!(cart.needs_attention());
    assert_eq!(cart.payment_id(), Some("pay-3"));
    assert!(orders::find_by_payment_id(&state.db, "pay-3").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_webhook_notification_settles_payment(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 3).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 1).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    app.gateway.add_payment("pay-4", "approved", &cart.id().to_string());

    checkout::handle_notification(state, Notification::Payment("pay-4".into())).await;
    assert!(orders::find_by_payment_id(&state.db, "pay-4").await.unwrap().is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_guest_cart_is_merged_on_sign_in(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 10).await;
    let user = seed_user(state).await;

    let guest = cart_service::resolve(state, None, None).await.unwrap();
    assert!(matches!(guest.cookie, CookieUpdate::Set(id) if id == guest.cart.id()));
    cart_service::add_item(state, guest.cart.id(), product.id, 3).await.unwrap();

    let resolved = cart_service::resolve(state, Some(user.id), Some(guest.cart.id())).await.unwrap();
    assert!(matches!(resolved.cookie, CookieUpdate::Clear));
    assert_eq!(resolved.cart.lines().len(), 1);
    assert_eq!(resolved.cart.lines()[0].quantity(), 3);
    assert!(carts::find(&state.db, guest.cart.id()).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_merchant_order_notification_settles_approved_payment(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 3).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 1).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    app.gateway.add_payment("pay-5", "approved", &cart.id().to_string());
    app.gateway.add_merchant_order("mo-1", &[("pay-5-declined", "rejected"), ("pay-5", "approved")]);

    checkout::handle_notification(state, Notification::MerchantOrder("mo-1".into())).await;
    let order = orders::find_by_payment_id(&state.db, "pay-5").await.unwrap().unwrap();
    assert_eq!(order.total(), dec!(1500));
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_duplicate_settlement_creates_one_order(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 5).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 2).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();

    let paid = payment("pay-6", "approved", &cart.id().to_string());
    let (a, b) = tokio::join!(checkout::settle_payment(state, &paid), checkout::settle_payment(state, &paid));
    let order_id = orders::find_by_payment_id(&state.db, "pay-6").await.unwrap().unwrap().id();
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, Settlement::AlreadyProcessed(_)));
    assert_eq!(outcomes, vec![Settlement::OrderCreated(order_id), Settlement::AlreadyProcessed(order_id)]);
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_payment_for_an_edited_cart_is_not_settled(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 10).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 1).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();
    cart_service::add_item(state, cart.id(), product.id, 4).await.unwrap();

    let outcome = checkout::settle_payment(state, &payment("pay-old", "approved", &cart.id().to_string())).await.unwrap();
    assert_eq!(outcome, Settlement::PaymentMismatch);
    assert!(orders::find_by_payment_id(&state.db, "pay-old").await.unwrap().is_none());
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 10);

    let cart = carts::find(&state.db, cart.id()).await.unwrap().unwrap();
    assert_eq!(cart.status(), CartStatus::Active);
    assert_eq!(cart.lines()[0].quantity(), 5);
    assert_eq!(cart.payment_id(), Some("pay-old"));
    assert!(cart.needs_attention());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_paid_amount_must_match_cart_total(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 10).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 2).await.unwrap();
    checkout::create_preference(state, cart.id(), user.id).await.unwrap();

    let mut short = payment("pay-7", "approved", &cart.id().to_string());
    short.transaction_amount = Some(dec!(1500));
    assert_eq!(checkout::settle_payment(state, &short).await.unwrap(), Settlement::PaymentMismatch);
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 10);

    let mut full = payment("pay-8", "approved", &cart.id().to_string());
    full.transaction_amount = Some(dec!(3000.00));
    let outcome = checkout::settle_payment(state, &full).await.unwrap();
    assert!(matches!(outcome, Settlement::OrderCreated(_)), "got {outcome:?}");
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 8);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_product_edit_waits_for_a_sale_in_flight(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = app.state.clone();
    let product = seed_product(&state, 5).await;

    let mut sale = state.db.begin().await.unwrap();
    products::lock_many(&mut sale, &[product.id]).await.unwrap();
    products::set_stock(&mut *sale, product.id, 2).await.unwrap();

    let edit = tokio::spawn({
        let state = state.clone();
        let id = product.id;
        async move {
            let patch = ProductPatch { price: Some(dec!(1700)), ..Default::default() };
            product_service::update(&state, id, patch).await
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    sale.commit().await.unwrap();

    let updated = edit.await.unwrap().unwrap();
    assert_eq!(updated.price, dec!(1700));
    assert_eq!(updated.stock, 2);
    assert_eq!(products::find(&state.db, product.id).await.unwrap().unwrap().stock, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_direct_order_uses_item_quantities(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let filter = seed_product(state, 5).await;
    let pads = seed_product(state, 3).await;
    let user = seed_user(state).await;

    let placed = order_service::create_direct(state, user.id, &[(filter.id, 2), (pads.id, 3)]).await.unwrap();
    assert_eq!(placed.order_details.price, dec!(7500));
    let order = orders::find(&state.db, placed.id).await.unwrap().unwrap();
    assert_eq!(order.items().len(), 2);
    assert_eq!(products::find(&state.db, filter.id).await.unwrap().unwrap().stock, 3);
    assert_eq!(products::find(&state.db, pads.id).await.unwrap().unwrap().stock, 0);

    let err = order_service::create_direct(state, user.id, &[(pads.id, 1)]).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");
    assert_eq!(orders::list_for_user(&state.db, user.id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_merge_clamps_to_live_stock(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 3).await;
    let user = seed_user(state).await;

    let user_cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, user_cart.id(), product.id, 2).await.unwrap();
    let guest = cart_service::resolve(state, None, None).await.unwrap().cart;
    cart_service::add_item(state, guest.id(), product.id, 2).await.unwrap();

    let merged = cart_service::resolve(state, Some(user.id), Some(guest.id())).await.unwrap().cart;
    assert_eq!(merged.id(), user_cart.id());
    assert_eq!(merged.lines().len(), 1);
    assert_eq!(merged.lines()[0].quantity(), 3);
    assert_eq!(merged.subtotal(), dec!(4500));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_first_cart_requests_race_to_one_cart(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let user = seed_user(state).await;

    let (a, b) = tokio::join!(cart_service::resolve(state, Some(user.id), None), cart_service::resolve(state, Some(user.id), None));
    assert_eq!(a.unwrap().cart.id(), b.unwrap().cart.id());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_deleted_product_is_reported_on_refresh(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 4).await;
    let user = seed_user(state).await;

    let cart = cart_service::resolve(state, Some(user.id), None).await.unwrap().cart;
    cart_service::add_item(state, cart.id(), product.id, 1).await.unwrap();
    assert_eq!(products::delete(&state.db, product.id).await.unwrap(), 1);

    let (cart, changes) = cart_service::refresh(state, cart.id()).await.unwrap();
    assert_eq!(cart.lines().len(), 1);
    assert!(matches!(changes.as_slice(), [CartChange::ProductUnavailable { product_id, .. }] if *product_id == product.id));
    assert!(cart.needs_attention());
    assert!(cart_service::prepare_checkout(state, cart.id()).await.is_err());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_reviews_both_count_in_rating(pool: PgPool) {
    let app = app_with_pool(pool);
    let state = &app.state;
    let product = seed_product(state, 1).await;
    let first = seed_user(state).await;
    let second = seed_user(state).await;

    let product_id = product.id;
    let review = move |user_id: Uuid, rating: i16| async move {
        let mut tx = state.db.begin().await?;
        reviews::insert_comment(&mut tx, product_id, user_id, "Buen filtro", rating).await?;
        tx.commit().await
    };
    let (a, b) = tokio::join!(review(first.id, 4), review(second.id, 5));
    a.unwrap();
    b.unwrap();

    let rated = products::find(&state.db, product.id).await.unwrap().unwrap();
    assert_eq!(rated.total_reviews, 2);
    assert_eq!(rated.average_rating, dec!(4.5));
}
