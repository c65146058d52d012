//! Chat turns over HTTP: body framing, accumulation, failures.

use weft_client::CHAT_PATH;
use weft_engine::weft_types::Role;
use weft_engine::{SessionState, Truncation, TurnOutcome, UserInput};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{delta, mount_chat, received_bodies, session_for};

#[tokio::test]
async fn concatenated_objects_become_one_answer() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        [delta("The answer "), delta("is "), delta("42.")].concat(),
    )
    .await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("What is the answer?")).unwrap();
    session.settle().await;

    let messages = session.log().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].content(), "The answer is 42.");
    assert_eq!(session.last_outcome(), Some(&TurnOutcome::Completed));

    let bodies = received_bodies(&server, CHAT_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["model_id"], "test-model");
    assert_eq!(bodies[0]["use_mcp"], true);
    assert_eq!(bodies[0]["chat_history"][0]["role"], "user");
    assert_eq!(bodies[0]["chat_history"][0]["content"], "What is the answer?");
}

#[tokio::test]
async fn whitespace_between_objects_is_ignored() {
    let server = MockServer::start().await;
    mount_chat(&server, format!("{}\n\n  {}\n", delta("a"), delta("b"))).await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("hi")).unwrap();
    session.settle().await;

    assert_eq!(session.log().last().unwrap().content(), "ab");
}

#[tokio::test]
async fn cut_off_body_keeps_complete_objects() {
    let server = MockServer::start().await;
    let mut body = delta("complete");
    body.push_str(r#"{"choices":[{"delta":{"content":" and cut"#);
    mount_chat(&server, body).await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("hi")).unwrap();
    session.settle().await;

    assert_eq!(session.log().last().unwrap().content(), "complete");
    assert!(matches!(
        session.last_outcome(),
        Some(TurnOutcome::Truncated(Truncation::IncompleteObject(_)))
    ));
}

#[tokio::test]
async fn http_error_shows_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{CHAT_PATH}")))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })),
        )
        .mount(&server)
        .await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("hi")).unwrap();
    session.settle().await;

    let answer = session.log().last().unwrap();
    assert!(answer.is_assistant());
    assert!(answer.content().starts_with("[Stream error]"));
    assert!(answer.content().contains("HTTP 429"));
    assert!(answer.content().contains("Rate limit exceeded"));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn empty_body_fails_the_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{CHAT_PATH}")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("hi")).unwrap();
    session.settle().await;

    assert!(matches!(session.last_outcome(), Some(TurnOutcome::Failed(_))));
    assert_eq!(session.log().len(), 2);
}

#[tokio::test]
async fn follow_up_carries_the_whole_conversation() {
    let server = MockServer::start().await;
    mount_chat(&server, delta("Paris.")).await;
    let mut session = session_for(&server);

    session.submit(UserInput::text("Capital of France?")).unwrap();
    session.settle().await;
    session.submit(UserInput::text("And of Italy?")).unwrap();
    session.settle().await;

    let bodies = received_bodies(&server, CHAT_PATH).await;
    assert_eq!(bodies.len(), 2);
    let history = bodies[1]["chat_history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1]["role"], "assistant");
    assert_eq!(history[1]["content"], "Paris.");
    assert_eq!(history[2]["content"], "And of Italy?");
}
