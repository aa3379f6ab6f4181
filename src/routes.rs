use axum::{
    routing::{get, patch, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{auth, cart, categories, inventory, orders, payments, products, reviews, users};
use crate::state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "repustore"}))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth", get(auth::index))
        .route("/auth/register", post(auth::register))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify/:token", get(auth::verify))
        .route("/auth/google", get(auth::google_start))
        .route("/auth/google/redirect", get(auth::google_callback))
        .route("/users", get(users::list))
        .route("/users/:id", get(users::get).put(users::update).delete(users::delete))
        .route("/users/:id/toggle-ban", put(users::toggle_ban))
        .route("/users/:id/toggle-admin", put(users::toggle_admin))
        .route("/products", get(products::list).post(products::create))
        .route("/products/facets", get(products::facets))
        .route("/products/name/:name", get(products::get_by_name))
        .route("/products/:id", get(products::get).put(products::update).delete(products::remove))
        .route("/file/uploadImage/:id", post(products::upload_image))
        .route("/categories", get(categories::list).post(categories::create))
        .route("/categories/:id", get(categories::get))
        .route("/comments", post(reviews::create_comment))
        .route("/comments/product/:id", get(reviews::product_comments))
        .route("/favorites", get(reviews::my_favorites))
        .route("/favorites/admin/all", get(reviews::all_favorites))
        .route("/favorites/:id", post(reviews::add_favorite).delete(reviews::remove_favorite))
        .route("/stock", post(inventory::add_stock))
        .route("/stock/:id", put(inventory::set_stock))
        .route("/suppliers", get(inventory::list_suppliers).post(inventory::create_supplier))
        .route(
            "/suppliers/:id",
            get(inventory::get_supplier).put(inventory::update_supplier).delete(inventory::delete_supplier),
        )
        .route("/cart", get(cart::get).delete(cart::clear))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:id", patch(cart::update_quantity).delete(cart::remove_item))
        .route("/cart/checkout", post(cart::checkout))
        .route("/payments/checkout/:id", post(payments::create_checkout))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/success", post(payments::success))
        .route("/payments/failure", post(payments::failure))
        .route("/payments/pending", post(payments::pending))
        .route("/payments/confirm", post(payments::confirm))
        .route("/orders", get(orders::find_all).post(orders::create))
        .route("/orders/me", get(orders::find_mine))
        .route("/orders/dashboard", get(orders::dashboard))
        .route("/orders/:id", get(orders::find_one))
        .route("/orders/:id/status", patch(orders::approve))
        .route("/dashboard/summary", get(orders::summary))
        .route("/dashboard/sales-by-category", get(orders::sales_by_category))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
