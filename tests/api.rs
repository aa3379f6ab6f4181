mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use common::{lazy_app, token};

async fn send(request: Request<Body>) -> Response {
    repustore::router(lazy_app().state).oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "repustore");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let response = send(Request::get("/orders/me").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        Request::get("/orders/me").header(header::AUTHORIZATION, "Bearer not-a-jwt").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let response = send(
        Request::get("/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(false)))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_without_id_is_rejected() {
    let response = send(Request::post("/payments/webhook?type=payment").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_other_topic_is_acknowledged() {
    let response = send(Request::post("/payments/webhook?topic=chargebacks&id=42").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);
}

#[tokio::test]
async fn test_payment_redirect_acknowledgements() {
    for (path, status) in [("/payments/success", "success"), ("/payments/failure", "failure"), ("/payments/pending", "pending")] {
        let response = send(Request::post(path).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], status);
    }
}

#[tokio::test]
async fn test_guest_cannot_check_out() {
    let response = send(Request::post("/cart/checkout").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_direct_order_without_products_is_rejected() {
    let response = send(
        Request::post("/orders")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(false)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"products":[]}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validates_before_touching_the_database() {
    let boundary = "repustore-boundary";
    let fields = [
        ("email", "not-an-email"),
        ("name", "Al"),
        ("password", "short"),
        ("confirmPassword", "different"),
        ("address", "Calle Falsa 123"),
        ("phone", "3415550000"),
        ("country", "Argentina"),
        ("city", "Rosario"),
    ];
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    let response = send(
        Request::post("/auth/register")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_google_login_requires_configuration() {
    let response = send(Request::get("/auth/google").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
