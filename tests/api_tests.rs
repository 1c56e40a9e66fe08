// tests/api_tests.rs

use std::sync::Arc;

use exam_portal::{
    client::HttpExamApi,
    config::Config,
    models::user::{NewUser, Role},
    routes,
    session::{SessionCommand, SessionDriver, SessionOutcome, SubmitTrigger},
    state::AppState,
    store::{MemoryStore, UserStore},
    utils::password::hash_password,
};
use serde_json::{Value, json};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-password";

/// Spawns the app on a random port with an in-memory store and a seeded
/// admin. Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let store = Arc::new(MemoryStore::new());
    store
        .create_user(NewUser {
            name: "Admin".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let config = Config {
        database_url: String::new(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        admin_email: None,
        admin_name: None,
        admin_password: None,
    };

    let state = AppState { store, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn login(client: &reqwest::Client, address: &str, email: &str, password: &str) -> String {
    let body: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    body["token"].as_str().expect("Token not found").to_string()
}

async fn register_student(client: &reqwest::Client, address: &str) -> String {
    let email = format!("s_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "name": "Student", "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    login(client, address, &email, "password123").await
}

/// Creates the two-question exam used throughout: marks [1, 3], keys [0, 1].
/// Returns (exam id, first question id, second question id).
async fn create_sample_exam(client: &reqwest::Client, address: &str, admin: &str) -> (i64, i64, i64) {
    let response = client
        .post(format!("{}/api/exams", address))
        .bearer_auth(admin)
        .json(&json!({
            "title": "Rust fundamentals",
            "description": "Ownership quiz",
            "duration": 1,
            "totalMarks": 999,
            "questions": [
                { "question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": 0, "marks": 1 },
                { "question": "Q2", "options": ["a", "b", "c", "d"], "correctAnswer": 1, "marks": 3 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let exam: Value = response.json().await.unwrap();
    assert_eq!(exam["totalMarks"], 4, "client-supplied total must be ignored");
    (
        exam["id"].as_i64().unwrap(),
        exam["questions"][0]["id"].as_i64().unwrap(),
        exam["questions"][1]["id"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn unknown_path_is_404() {
    let address = spawn_app().await;
    let response = reqwest::get(format!("{}/random_path_that_does_not_exist", address))
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "name": "A", "email": "nope", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_body_uses_uniform_error_shape() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_student(&client, &address).await;

    let response = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn unauthenticated_exam_fetch_is_401() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (exam_id, _, _) = create_sample_exam(&client, &address, &admin).await;

    let response = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("questions").is_none());

    let response = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn answer_keys_follow_caller_role() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, _, _) = create_sample_exam(&client, &address, &admin).await;

    let as_student: Value = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(as_student["questions"][0].get("correctAnswer").is_none());

    let listed: Vec<Value> = client
        .get(format!("{}/api/exams", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed[0]["questions"][0].get("correctAnswer").is_none());

    let as_admin: Value = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(as_admin["questions"][1]["correctAnswer"], 1);
}

#[tokio::test]
async fn students_cannot_author_or_list_all_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let student = register_student(&client, &address).await;

    let response = client
        .post(format!("{}/api/exams", address))
        .bearer_auth(&student)
        .json(&json!({ "title": "Sneaky", "duration": 5, "questions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .get(format!("{}/api/results/all", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn submit_grades_and_lists_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, q1, q2) = create_sample_exam(&client, &address, &admin).await;

    let response = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({
            "examId": exam_id,
            "answers": [
                { "questionId": q1, "selectedAnswer": 0 },
                { "questionId": q2, "selectedAnswer": 0 },
                { "questionId": 424242, "selectedAnswer": 2 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["score"], 1);
    assert_eq!(body["result"]["totalMarks"], 4);
    assert_eq!(body["result"]["percentage"], 25.0);

    // Empty answer set scores zero.
    let body: Value = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({ "examId": exam_id, "answers": [] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["score"], 0);
    assert_eq!(body["result"]["percentage"], 0.0);

    let mine: Vec<Value> = client
        .get(format!("{}/api/results/my-results", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0]["score"], 0, "newest result comes first");
    assert_eq!(mine[0]["exam"]["title"], "Rust fundamentals");

    let all: Vec<Value> = client
        .get(format!("{}/api/results/all", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["student"]["name"], "Student");
}

#[tokio::test]
async fn exam_edits_do_not_change_past_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, q1, _) = create_sample_exam(&client, &address, &admin).await;

    client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({ "examId": exam_id, "answers": [{ "questionId": q1, "selectedAnswer": 0 }] }))
        .send()
        .await
        .unwrap();

    let response = client
        .put(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Rust fundamentals v2",
            "duration": 2,
            "questions": [
                { "question": "Only", "options": ["a", "b", "c", "d"], "correctAnswer": 2, "marks": 10 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mine: Vec<Value> = client
        .get(format!("{}/api/results/my-results", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine[0]["totalMarks"], 4);
    assert_eq!(mine[0]["score"], 1);
}

#[tokio::test]
async fn malformed_submissions_are_rejected_before_grading() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, q1, _) = create_sample_exam(&client, &address, &admin).await;

    let duplicate = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({
            "examId": exam_id,
            "answers": [
                { "questionId": q1, "selectedAnswer": 0 },
                { "questionId": q1, "selectedAnswer": 1 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 400);

    let out_of_range = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({ "examId": exam_id, "answers": [{ "questionId": q1, "selectedAnswer": 7 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    let missing_exam = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({ "examId": 987654, "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_exam.status().as_u16(), 404);

    let mine: Vec<Value> = client
        .get(format!("{}/api/results/my-results", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn retried_submission_is_recorded_once() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, _, q2) = create_sample_exam(&client, &address, &admin).await;

    let payload = json!({
        "examId": exam_id,
        "answers": [{ "questionId": q2, "selectedAnswer": 1 }],
        "submissionId": uuid::Uuid::new_v4()
    });

    let first = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();

    let second = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 200);
    let second: Value = second.json().await.unwrap();
    assert_eq!(first["result"]["resultId"], second["result"]["resultId"]);
    assert_eq!(second["result"]["score"], 3);

    let mine: Vec<Value> = client
        .get(format!("{}/api/results/my-results", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn submission_key_reused_on_another_exam_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (first_exam, q1, _) = create_sample_exam(&client, &address, &admin).await;
    let (second_exam, _, _) = create_sample_exam(&client, &address, &admin).await;
    let key = uuid::Uuid::new_v4();

    let response = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({
            "examId": first_exam,
            "answers": [{ "questionId": q1, "selectedAnswer": 0 }],
            "submissionId": key
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/results/submit", address))
        .bearer_auth(&student)
        .json(&json!({ "examId": second_exam, "answers": [], "submissionId": key }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let mine: Vec<Value> = client
        .get(format!("{}/api/results/my-results", address))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["exam"]["id"], first_exam);
}

#[tokio::test]
async fn delete_then_fetch_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (exam_id, _, _) = create_sample_exam(&client, &address, &admin).await;

    let response = client
        .delete(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let address = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/api/results/submit"].is_object());
}

#[tokio::test]
async fn session_runs_against_the_server() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &address, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let student = register_student(&client, &address).await;
    let (exam_id, q1, q2) = create_sample_exam(&client, &address, &admin).await;

    let api = HttpExamApi::new(address.clone()).with_token(student);
    let driver = SessionDriver::new(Arc::new(api.clone()), exam_id);
    let (tx, rx) = tokio::sync::mpsc::channel(8);

    tx.send(SessionCommand::Select { question_id: q1, option: 0 }).await.unwrap();
    tx.send(SessionCommand::Select { question_id: q2, option: 1 }).await.unwrap();
    tx.send(SessionCommand::Submit).await.unwrap();

    match driver.run(rx).await {
        SessionOutcome::Submitted { summary, trigger } => {
            assert_eq!(trigger, SubmitTrigger::Manual);
            assert_eq!(summary.score, 4);
            assert_eq!(summary.percentage, 100.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let mine = api.my_results().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].exam.id, exam_id);
}
