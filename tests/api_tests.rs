//! HTTP surface tests: each route exercised in-process through the router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use tutora_backend_rust::engine::config::EngineConfig;
use tutora_backend_rust::routes;
use tutora_backend_rust::services::judge_provider::ContentGenerator;
use tutora_backend_rust::state::AppState;

use common::{fixture_curriculum, memory_store};

async fn app() -> axum::Router {
    let store = memory_store().await;
    let state = AppState::new(
        Arc::new(store),
        Arc::new(fixture_curriculum()),
        EngineConfig::default(),
        Arc::new(ContentGenerator::from_env()),
    );
    routes::router(state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json_body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn question_json(id: &str, subtopic: &str, unit: &str, code: &str) -> Value {
    json!({
        "id": id,
        "subtopicId": subtopic,
        "difficulty": "easy",
        "prompt": "solve",
        "expectedAnswer": "2",
        "primaryUnit": unit,
        "supportingUnits": [],
        "steps": [{"index": 0, "unitId": unit, "unitCode": code, "text": "step"}],
        "isCombination": false,
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_app_wires_the_full_stack_from_env() {
    // Defaults: in-memory store, empty curriculum, unconfigured generator.
    let app = tutora_backend_rust::create_app().await.unwrap();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validate_rejects_uncovered_assessment_with_details() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/assessments/validate",
        Some(json!({
            "questions": [question_json("q1", "lin", "u-t1", "T1")],
            "requiredUnitIds": ["u-t1", "u-t2"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_FAILURE");
    let details = body["details"].as_array().unwrap();
    assert!(details
        .iter()
        .any(|v| v["reason"] == "required_unit_uncovered"));
}

#[tokio::test]
async fn validate_accepts_covering_assessment() {
    let app = app().await;
    let mut combo = question_json("q2", "lin", "u-t1", "T1");
    combo["supportingUnits"] = json!(["u-t2"]);
    combo["isCombination"] = json!(true);

    let (status, body) = send(
        &app,
        "POST",
        "/api/assessments/validate",
        Some(json!({
            "questions": [question_json("q1", "lin", "u-t1", "T1"), combo],
            "requiredUnitIds": ["u-t1", "u-t2"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ok"], true);
}

#[tokio::test]
async fn short_horizon_goal_is_a_precondition_violation() {
    let app = app().await;
    let target = Utc::now().date_naive() + Duration::days(7);
    let (status, body) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({
            "studentId": "student-1",
            "targetDate": target.to_string(),
            "topicIds": ["alg"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "PRECONDITION_VIOLATION");
}

#[tokio::test]
async fn goal_lifecycle_over_http() {
    let app = app().await;
    let target = Utc::now().date_naive() + Duration::days(30);

    let (status, body) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({
            "studentId": "student-1",
            "targetDate": target.to_string(),
            "topicIds": ["alg"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let goal_id = body["data"]["goal"]["id"].as_str().unwrap().to_string();
    assert!(!body["data"]["nodes"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, "GET", &format!("/api/goals/{goal_id}/path"), None).await;
    assert_eq!(status, StatusCode::OK);
    let nodes = body["data"]["nodes"].as_array().unwrap().clone();
    let node_id = nodes[0]["id"].as_str().unwrap().to_string();

    // Complete a node, then send a weak signal; the completed node must
    // survive untouched and reinforcement must appear.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/goals/{goal_id}/nodes/{node_id}"),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/goals/{goal_id}/signal"),
        Some(json!({
            "topicId": "alg",
            "score": 35,
            "weakUnits": ["u-t2"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let inserted = body["data"]["inserted"].as_array().unwrap();
    assert_eq!(inserted.len(), 1);
    assert!(inserted[0]["orderIndex"].as_i64().unwrap() < 0);

    let (_, body) = send(&app, "GET", &format!("/api/goals/{goal_id}/path"), None).await;
    let after: Vec<Value> = body["data"]["nodes"].as_array().unwrap().clone();
    let completed = after
        .iter()
        .find(|n| n["id"] == node_id.as_str())
        .unwrap();
    assert_eq!(completed["status"], "completed");

    // A terminal node cannot be flipped back.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/goals/{goal_id}/nodes/{node_id}"),
        Some(json!({"status": "pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SCHEDULING_CONFLICT");
}

#[tokio::test]
async fn signal_for_unknown_goal_is_not_found() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/goals/no-such-goal/signal",
        Some(json!({"topicId": "alg", "score": 50, "weakUnits": []})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn diagnostic_submit_then_fetch_profile() {
    let app = app().await;
    let responses: Vec<Value> = (0..4)
        .map(|i| {
            json!({
                "questionId": format!("q{i}"),
                "subtopicId": "lin",
                "isCorrect": i < 1,
                "misconceptionTag": if i >= 1 { Value::from("sign-error") } else { Value::Null },
            })
        })
        .collect();

    let (status, body) = send(
        &app,
        "POST",
        "/api/diagnostics/submit",
        Some(json!({"studentId": "student-1", "responses": responses})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 1/4 correct -> level 25, a weakness.
    assert_eq!(body["data"]["subtopicLevels"][0]["level"], 25);
    assert_eq!(body["data"]["weaknesses"][0], "lin");
    assert_eq!(body["data"]["misconceptionPatterns"][0]["tag"], "sign-error");

    let (status, body) = send(&app, "GET", "/api/diagnostics/student-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["weaknesses"][0], "lin");

    let (status, _) = send(&app, "GET", "/api/diagnostics/student-unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mastery_submit_grades_with_fallback_judge() {
    // No GENERATOR_API_KEY in the test environment, so judging falls back
    // to literal comparison.
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/mastery/submit",
        Some(json!({
            "studentId": "student-1",
            "questions": [
                question_json("q1", "lin", "u-t1", "T1"),
                question_json("q2", "lin", "u-t1", "T1"),
            ],
            "submissions": [
                {"questionId": "q1", "answerText": "2"},
                {"questionId": "q2", "answerText": "7"},
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overallScore"], 50);
    let breakdown = body["data"]["unitBreakdown"].as_array().unwrap();
    assert_eq!(breakdown[0]["unitId"], "u-t1");
    assert_eq!(breakdown[0]["percentage"], 50);
    assert_eq!(breakdown[0]["classification"], "needs_review");
}

#[tokio::test]
async fn strategy_attempts_escalate_and_reset() {
    let app = app().await;
    let attempt = |correct: bool| {
        json!({
            "studentId": "student-1",
            "questionFamily": "linear-two-step",
            "isCorrect": correct,
        })
    };

    let (_, body) = send(&app, "POST", "/api/strategy/attempt", Some(attempt(false))).await;
    assert_eq!(body["data"]["stage"], "second_attempt");
    let (_, body) = send(&app, "POST", "/api/strategy/attempt", Some(attempt(false))).await;
    assert_eq!(body["data"]["stage"], "escalated");
    let (_, body) = send(&app, "POST", "/api/strategy/attempt", Some(attempt(true))).await;
    assert_eq!(body["data"]["stage"], "first_attempt");
}
