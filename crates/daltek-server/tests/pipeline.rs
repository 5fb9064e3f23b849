use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use daltek_ir::{Position, Table, WidgetDto};
use daltek_server::{router, AppState, Config};
use daltek_sql::StaticRowSource;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = Config::from_yaml(
        "pipeline:\n  preview_limit: 1\nsaved_queries:\n  - id: 'q1'\n    name: Big orders\n    doctype: orders\n    columns: [customer, total]\n    filters:\n      - {col: total, op: '>', val: 100}\n",
    )
    .unwrap();
    let orders = Table::from_records(&[
        json!({"id": 1, "customer": "acme", "total": 120}),
        json!({"id": 2, "customer": "globex", "total": 75}),
    ])
    .unwrap();
    let source = StaticRowSource::new().with_table("orders", orders);
    router(AppState::new(config, Arc::new(source)).unwrap())
}

async fn send(app: &Router, method: &str, path: &str, payload: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match payload {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn sales() -> Value {
    json!({
        "success": true,
        "results": [
            {"region": "North", "revenue": 100},
            {"region": "South", "revenue": 80},
            {"region": "North", "revenue": 120}
        ]
    })
}

#[tokio::test]
async fn test_build_query() {
    let app = app();
    let spec = json!({
        "select": ["name"],
        "from": "users",
        "where": [{"field": "age", "operator": ">", "value": 21}],
        "limit": 10
    });

    let (status, body) = send(&app, "POST", "/api/query/build", Some(spec.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["sql"], json!("SELECT name FROM users WHERE age > 21 LIMIT 10"));

    let (_, body) = send(&app, "POST", "/api/query/build-parameterized", Some(spec)).await;
    assert_eq!(body["sql"], json!("SELECT name FROM users WHERE age > ? LIMIT 10"));
    assert_eq!(body["params"], json!([21]));

    let loose = json!({"select": ["name"], "from": "users", "where": ["a>5", {"field": "age", "operator": ">", "value": 21}]});
    let (status, body) = send(&app, "POST", "/api/query/build", Some(loose)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], json!("SELECT name FROM users WHERE age > 21"));

    let (status, body) = send(&app, "POST", "/api/query/build", Some(json!({"select": ["name"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error_type"], json!("InvalidSpec"));
}

#[tokio::test]
async fn test_malformed_body_is_an_envelope() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/query/build")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error_type"], json!("InvalidInput"));
}

#[tokio::test]
async fn test_execute_saved_query() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/query/saved/q1/execute", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], json!("SELECT customer, total FROM orders WHERE total > ?"));
    assert_eq!(body["params"], json!([100]));
    assert_eq!(body["results"][0], json!({"customer": "acme", "total": 120}));

    let (status, body) = send(&app, "POST", "/api/query/saved/nope/execute", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], json!("NotFoundError"));
}

#[tokio::test]
async fn test_transform_and_preview() {
    let app = app();
    let request = json!({
        "query_result": sales(),
        "mapper_config": {
            "transformations": {
                "aggregations": {"total": {"column": "revenue", "func": "sum"}},
                "group_by": ["region"]
            },
            "widget_mapping": {"type": "echart", "chart_type": "bar", "x_axis": "region", "y_axes": ["total"]}
        }
    });

    let (status, body) = send(&app, "POST", "/api/mapper/transform", Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["xAxis"]["data"], json!(["North", "South"]));
    assert_eq!(body["data"]["series"][0]["data"], json!([220, 80]));
    assert_eq!(body["metadata"]["original_rows"], json!(3));

    let (_, body) = send(&app, "POST", "/api/mapper/preview", Some(request)).await;
    assert_eq!(body["metadata"]["transformed_rows"], json!(1));

    let failed = json!({
        "query_result": {"success": false, "error": "timeout"},
        "mapper_config": {"widget_mapping": {"type": "table"}}
    });
    let (status, body) = send(&app, "POST", "/api/mapper/transform", Some(failed)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("Execution error: timeout"));

    let (status, text) = send_text(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(r#"daltek_transform_requests_total{outcome="success",widget="echart"} 2"#));
    assert!(text.contains(r#"daltek_transform_requests_total{outcome="error",widget="table"} 1"#));
}

#[tokio::test]
async fn test_mapper_helpers() {
    let app = app();
    let (_, body) = send(&app, "GET", "/api/mapper/operations/Currency", None).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["aggregations"].as_array().unwrap().contains(&json!("sum")));
    assert!(body["calculations"].as_array().unwrap().contains(&json!("percentage")));

    let (_, body) = send(&app, "POST", "/api/mapper/columns", Some(json!({"data": sales()["results"]}))).await;
    assert_eq!(body["columns"].as_array().unwrap().len(), 2);
    assert_eq!(body["columns"][0]["name"], json!("region"));

    let validate = json!({
        "mapper_config": {"transformations": {"group_by": ["missing"]}},
        "columns": body["columns"]
    });
    let (_, body) = send(&app, "POST", "/api/mapper/validate", Some(validate)).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["is_valid"], json!(false));
}

#[tokio::test]
async fn test_unknown_names_are_reported_not_rejected() {
    let app = app();
    let columns = json!([{"name": "region", "type": "Data"}, {"name": "revenue", "type": "Currency"}]);
    let validate = json!({
        "mapper_config": {"transformations": {
            "aggregations": {"total": {"column": "revenue", "func": "total"}},
            "filters": [{"column": "region", "operator": "matches", "value": "N.*"}]
        }},
        "columns": columns
    });
    let (status, body) = send(&app, "POST", "/api/mapper/validate", Some(validate)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], json!(false));
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let request = json!({
        "query_result": sales(),
        "mapper_config": {"transformations": {
            "aggregations": {"total": {"column": "revenue", "func": "total"}}
        }}
    });
    let (status, body) = send(&app, "POST", "/api/mapper/transform", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], json!("ValidationError"));
}

#[tokio::test]
async fn test_chart_build_and_types() {
    let app = app();
    let request = json!({
        "chart_type": "line",
        "data": {"categories": ["Jan", "Feb"], "series": [{"name": "Sales", "data": [10, 20]}]},
        "config": {"title": "Monthly"}
    });
    let (status, body) = send(&app, "POST", "/api/chart/build", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chart_type"], json!("line"));
    assert_eq!(body["config"]["series"][0]["type"], json!("line"));
    assert_eq!(body["config"]["title"]["text"], json!("Monthly"));

    let (status, body) = send(&app, "POST", "/api/chart/build", Some(json!({"chart_type": "radar", "data": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Chart type 'radar' is not supported. Available types: bar, line, pie, scatter")
    );

    let (_, body) = send(&app, "GET", "/api/chart/types", None).await;
    assert_eq!(body["types"], json!(["bar", "line", "pie", "scatter"]));
}

#[tokio::test]
async fn test_render_and_export() {
    let app = app();
    let widget = WidgetDto::echart(
        "pie",
        "Share",
        Position::default(),
        json!({"data": [{"name": "a", "value": 1}, {"name": "b", "value": 3}]}),
        json!({"series": []}),
    );
    let widget = serde_json::to_value(&widget).unwrap();

    let (_, body) = send(&app, "POST", "/api/chart/render", Some(widget.clone())).await;
    assert_eq!(body["widget"]["render_info"]["type"], json!("pie"));
    assert_eq!(body["widget"]["content"]["config"]["animationDuration"], json!(500));

    let batch = json!({"widgets": [widget.clone(), widget.clone()]});
    let (_, body) = send(&app, "POST", "/api/chart/render", Some(batch)).await;
    assert_eq!(body["widgets"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, "POST", "/api/chart/export", Some(widget)).await;
    assert_eq!(body["export"]["headers"], json!(["Name", "Value", "Percentage"]));
    assert_eq!(body["export"]["rows"][1], json!(["b", 3, "75.00%"]));
}

#[tokio::test]
async fn test_render_keeps_unrecognized_content() {
    let app = app();
    let content = json!({"type": "line_chart", "data": [1, 2, 3], "title": "Sales"});
    let widget = json!({
        "id": "w9",
        "type": "line_chart",
        "metadata": {"created_at": "2024-01-01T00:00:00Z", "modified_at": "2024-01-01T00:00:00Z", "version": 1},
        "layout": {"x": 0, "y": 0, "width": 6, "height": 4, "min_width": 4, "min_height": 3},
        "content": content
    });

    let (status, body) = send(&app, "POST", "/api/chart/render", Some(widget)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["widget"]["content"], content);
    assert_eq!(body["widget"]["render_info"]["type"], json!("line_chart"));
}

#[tokio::test]
async fn test_widget_validation() {
    let app = app();
    let request = json!({"widgets": [
        {"id": "w1", "type": "card", "properties": {"title": "Revenue"}},
        {"id": "w2", "type": "sparkline", "properties": {}}
    ]});
    let (_, body) = send(&app, "POST", "/api/widget/validate", Some(request)).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["valid"], json!(false));
    assert_eq!(body["total"], json!(2));
    assert_eq!(body["valid_count"], json!(1));
    assert_eq!(body["errors"][0]["widget_id"], json!("w2"));
}

#[tokio::test]
async fn test_health() {
    let (status, text) = send_text(&app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");
}

async fn send_text(app: &Router, path: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
