//! End-to-end request handling through `App`

use serde::{Deserialize, Serialize};
use serde_json::json;
use stark_core::{
    handler, Annotated, App, CorsHook, Error, Header, HttpError, Include, Method, Request, Response, Result,
    Route, SchemaType, Settings,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A product for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaType)]
struct Product {
    #[schema(read_only)]
    #[serde(default)]
    id: i64,
    name: String,
    price: f64,
}

/// Search filters.
#[derive(Debug, Clone, Serialize, Deserialize, SchemaType)]
struct Filters {
    name: Option<String>,
    max_price: Option<f64>,
}

/// List products.
///
/// :param limit: Maximum number of products
#[handler]
fn list_products(#[default(2)] limit: i64) -> Vec<Product> {
    let all = [("lamp", 20.0), ("desk", 120.0), ("chair", 60.0)];
    all.iter()
        .zip(1..)
        .take(usize::try_from(limit).unwrap_or(0))
        .map(|((name, price), id)| Product {
            id,
            name: (*name).to_string(),
            price: *price,
        })
        .collect()
}

#[handler]
fn get_product(product_id: i64) -> Result<Product> {
    if product_id == 1 {
        Ok(Product {
            id: 1,
            name: "lamp".to_string(),
            price: 20.0,
        })
    } else {
        Err(HttpError::not_found("No such product").into())
    }
}

#[handler]
fn create_product(product: Product) -> Response {
    let created = Product { id: 42, ..product };
    Response::json(&serde_json::to_value(created).unwrap_or_default()).with_status(201)
}

#[handler]
fn search(filters: Filters) -> serde_json::Value {
    json!({"name": filters.name, "max_price": filters.max_price})
}

#[handler]
fn delete_product(product_id: i64) {
    let _ = product_id;
}

#[handler]
fn echo_agent(user_agent: Header) -> String {
    user_agent.0.unwrap_or_default()
}

fn app() -> App {
    App::builder()
        .routes([
            Route::get("/products/", list_products_callable()).unwrap(),
            Route::get("/products/{product_id}/", get_product_callable()).unwrap(),
            Route::post("/products/", create_product_callable()).unwrap(),
            Route::get("/search/", search_callable()).unwrap(),
            Route::delete("/products/{product_id}/", delete_product_callable()).unwrap(),
            Route::get("/agent/", echo_agent_callable()).unwrap(),
        ])
        .build()
        .unwrap()
}

#[test]
fn test_query_default_and_coercion() {
    let app = app();
    let response = app.handle(Request::new(Method::Get, "/products/"));
    assert_eq!(response.status, 200);
    assert_eq!(response.json_body().unwrap().as_array().unwrap().len(), 2);

    let response = app.handle(Request::new(Method::Get, "/products/?limit=3"));
    assert_eq!(response.json_body().unwrap().as_array().unwrap().len(), 3);

    let response = app.handle(Request::new(Method::Get, "/products/?limit=many"));
    assert_eq!(response.status, 400);
    assert!(response.json_body().unwrap()["limit"].is_string());
}

#[test]
fn test_path_parameter() {
    let app = app();
    let response = app.handle(Request::new(Method::Get, "/products/1/"));
    assert_eq!(response.status, 200);
    assert_eq!(response.json_body().unwrap()["name"], "lamp");

    let response = app.handle(Request::new(Method::Get, "/products/7/"));
    assert_eq!(response.status, 404);
    assert_eq!(response.json_body(), Some(json!("No such product")));

    // A path segment that fails its schema is a 404, not a 400.
    let response = app.handle(Request::new(Method::Get, "/products/lamp/"));
    assert_eq!(response.status, 404);
}

#[test]
fn test_json_body() {
    let app = app();
    let response =
        app.handle(Request::new(Method::Post, "/products/").with_json(&json!({"name": "rug", "price": "15.5"})));
    assert_eq!(response.status, 201);
    let body = response.json_body().unwrap();
    assert_eq!(body["id"], 42);
    assert_eq!(body["price"], 15.5);

    let response = app.handle(Request::new(Method::Post, "/products/").with_json(&json!({"name": "rug"})));
    assert_eq!(response.status, 400);
    assert!(response.json_body().unwrap()["price"].is_string());
}

#[test]
fn test_invalid_and_unsupported_bodies() {
    let app = app();
    let response = app.handle(
        Request::new(Method::Post, "/products/")
            .with_header("content-type", "application/json")
            .with_body("{not json"),
    );
    assert_eq!(response.status, 400);

    let response = app.handle(
        Request::new(Method::Post, "/products/")
            .with_header("content-type", "text/csv")
            .with_body("a,b"),
    );
    assert_eq!(response.status, 415);
}

#[test]
fn test_form_body() {
    let response = app().handle(
        Request::new(Method::Post, "/products/")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=rug&price=9"),
    );
    assert_eq!(response.status, 201);
    assert_eq!(response.json_body().unwrap()["name"], "rug");
}

#[test]
fn test_schema_param_from_query_on_get() {
    let response = app().handle(Request::new(Method::Get, "/search/?name=lamp&max_price=30"));
    assert_eq!(response.status, 200);
    assert_eq!(response.json_body(), Some(json!({"name": "lamp", "max_price": 30.0})));
}

#[test]
fn test_unit_return_is_no_content() {
    let response = app().handle(Request::new(Method::Delete, "/products/1/"));
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}

#[test]
fn test_header_component() {
    let response = app().handle(Request::new(Method::Get, "/agent/").with_header("user-agent", "curl/8"));
    assert_eq!(response.status, 200);
    assert_eq!(response.text_body(), Some("curl/8"));
}

#[test]
fn test_handler_metadata() {
    let callable = list_products_callable();
    assert_eq!(callable.name(), "list_products");
    assert!(callable.doc().unwrap().starts_with("List products."));
    assert_eq!(callable.parameters()[0].default, Some(json!(2)));
}

#[derive(Debug, Clone, Annotated)]
struct Visits(Arc<AtomicUsize>);

static CREATED: AtomicUsize = AtomicUsize::new(0);

#[handler]
fn make_visits() -> Visits {
    CREATED.fetch_add(1, Ordering::SeqCst);
    Visits(Arc::new(AtomicUsize::new(0)))
}

#[handler]
fn visit(visits: Visits) -> i64 {
    i64::try_from(visits.0.fetch_add(1, Ordering::SeqCst) + 1).unwrap_or(i64::MAX)
}

#[test]
fn test_singleton_is_built_once() {
    let app = App::builder()
        .singleton(make_visits_callable())
        .route(Route::get("/visit", visit_callable()).unwrap())
        .build()
        .unwrap();
    for expected in 1..=3 {
        let response = app.handle(Request::new(Method::Get, "/visit"));
        assert_eq!(response.json_body(), Some(json!(expected)));
    }
    assert_eq!(CREATED.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Clone, Annotated)]
struct CurrentUser(String);

#[handler]
fn current_user(authorization: Header) -> Result<CurrentUser> {
    authorization
        .0
        .and_then(|value| value.strip_prefix("Bearer ").map(str::to_string))
        .map(CurrentUser)
        .ok_or_else(|| HttpError::forbidden("Missing token").into())
}

#[handler]
fn whoami(user: CurrentUser) -> String {
    user.0
}

#[test]
fn test_custom_component_and_its_errors() {
    let app = App::builder()
        .component_fn(current_user_callable())
        .route(Route::get("/me", whoami_callable()).unwrap())
        .build()
        .unwrap();
    let response = app.handle(Request::new(Method::Get, "/me").with_header("authorization", "Bearer ada"));
    assert_eq!(response.text_body(), Some("ada"));

    let response = app.handle(Request::new(Method::Get, "/me"));
    assert_eq!(response.status, 403);
}

mod tenant {
    use stark_core::Annotated;

    /// Shares its short name with the application settings.
    #[derive(Debug, Clone, Annotated)]
    pub struct Settings(pub String);
}

#[handler]
fn tenant_settings() -> tenant::Settings {
    tenant::Settings("acme".to_string())
}

#[handler]
fn tenant_name(settings: tenant::Settings) -> String {
    settings.0
}

#[test]
fn test_component_type_sharing_a_binding_name() {
    let app = App::builder()
        .component_fn(tenant_settings_callable())
        .route(Route::get("/tenant", tenant_name_callable()).unwrap())
        .build()
        .unwrap();
    let response = app.handle(Request::new(Method::Get, "/tenant"));
    assert_eq!(response.status, 200);
    assert_eq!(response.text_body(), Some("acme"));
}

#[test]
fn test_includes_and_reverse_url() {
    let app = App::builder()
        .route(Include::new(
            "/shop",
            "shop",
            vec![Route::get("/products/{product_id}/", get_product_callable()).unwrap().into()],
        ))
        .build()
        .unwrap();
    assert_eq!(
        app.reverse_url("shop:get_product", &[("product_id", "1")]).unwrap(),
        "/shop/products/1/"
    );
    assert!(matches!(
        app.reverse_url("get_product", &[]),
        Err(Error::NoReverseMatch { .. })
    ));
    let response = app.handle(Request::new(Method::Get, "/shop/products/1/"));
    assert_eq!(response.status, 200);
}

#[test]
fn test_hooks_wrap_error_responses() {
    let app = App::builder()
        .route(Route::get("/products/{product_id}/", get_product_callable()).unwrap())
        .hook(CorsHook::new())
        .build()
        .unwrap();
    let response = app.handle(Request::new(Method::Get, "/products/9/"));
    assert_eq!(response.status, 404);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
}

#[test]
fn test_standalone_route_skips_hooks() {
    let app = App::builder()
        .route(Route::get("/raw", echo_agent_callable()).unwrap().standalone(true))
        .hook(CorsHook::new())
        .build()
        .unwrap();
    let response = app.handle(Request::new(Method::Get, "/raw").with_header("user-agent", "x"));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), None);
}

#[handler]
async fn slow_square(value: i64) -> i64 {
    tokio::task::yield_now().await;
    value * value
}

#[tokio::test]
async fn test_async_handler() {
    let app = App::builder()
        .allow_async(true)
        .route(Route::get("/square", slow_square_callable()).unwrap())
        .build()
        .unwrap();
    let response = app.handle_async(Request::new(Method::Get, "/square?value=7")).await;
    assert_eq!(response.json_body(), Some(json!(49)));
}

#[test]
fn test_async_handler_rejected_by_sync_app() {
    let err = App::builder()
        .route(Route::get("/square", slow_square_callable()).unwrap())
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_schema_url_serves_openapi() {
    let app = App::builder()
        .settings(Settings::new().schema_url("/schema/").title("Shop").version("2.0"))
        .routes([
            Route::get("/products/", list_products_callable()).unwrap(),
            Route::post("/products/", create_product_callable()).unwrap(),
        ])
        .build()
        .unwrap();
    let response = app.handle(Request::new(Method::Get, "/schema/"));
    assert_eq!(response.status, 200);
    let doc = response.json_body().unwrap();
    assert_eq!(doc["info"]["version"], "2.0");
    assert!(doc["paths"].get("/schema/").is_none());

    let list = &doc["paths"]["/products/"]["get"];
    assert_eq!(list["summary"], "List products.");
    assert_eq!(list["parameters"][0]["description"], "Maximum number of products");
    assert_eq!(
        list["responses"]["200"]["content"]["application/json"]["schema"]["items"]["$ref"],
        "#/components/schemas/Product"
    );
    assert_eq!(
        doc["paths"]["/products/"]["post"]["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/Product"
    );
    assert_eq!(doc["components"]["schemas"]["Product"]["description"], "A product for sale.");
}
