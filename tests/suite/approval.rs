//! Tool approval round trips over HTTP.

use weft_client::{APPROVE_PATH, CHAT_PATH};
use weft_engine::{DECLINED_NOTICE, SessionState, TurnOutcome, UserInput};
use wiremock::{MockServer, ResponseTemplate};

use crate::common::{
    delta, event_stream, event_stream_response, mount_approve, mount_chat, received_bodies,
    session_for, tool_calls_pending,
};

async fn awaiting_approval(server: &MockServer) -> weft_engine::ChatSession {
    mount_chat(server, tool_calls_pending("weather in Pittsburgh")).await;
    let mut session = session_for(server);
    session.submit(UserInput::text("What's the weather?")).unwrap();
    session.settle().await;
    assert_eq!(session.state(), SessionState::AwaitingApproval);
    session
}

#[tokio::test]
async fn approved_calls_resume_over_the_event_stream() {
    let server = MockServer::start().await;
    mount_approve(
        &server,
        event_stream_response(event_stream(&[delta("It is "), delta("sunny.")])),
    )
    .await;
    let mut session = awaiting_approval(&server).await;

    assert_eq!(session.pending_tool_calls().len(), 1);
    assert_eq!(session.log().last().unwrap().content(), "Run search?");

    session.approve().unwrap();
    session.settle().await;

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_outcome(), Some(&TurnOutcome::Completed));
    assert_eq!(session.log().last().unwrap().content(), "It is sunny.");
    assert_eq!(session.log().len(), 3);

    let bodies = received_bodies(&server, APPROVE_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["approved"], true);
    assert_eq!(bodies[0]["tool_calls"][0]["function"]["name"], "search");
    assert_eq!(bodies[0]["mcp_server_type"], "cmu_api");
    assert_eq!(bodies[0]["chat_history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn resume_with_single_newline_events() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\ndata: {}\ndata: [DONE]\n",
        delta("Cloudy, "),
        delta("12C.")
    );
    mount_approve(&server, event_stream_response(body)).await;
    let mut session = awaiting_approval(&server).await;

    session.approve().unwrap();
    session.settle().await;

    assert_eq!(session.log().last().unwrap().content(), "Cloudy, 12C.");
    assert_eq!(session.last_outcome(), Some(&TurnOutcome::Completed));
}

#[tokio::test]
async fn decline_sends_nothing() {
    let server = MockServer::start().await;
    let mut session = awaiting_approval(&server).await;

    session.decline().unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.pending_tool_calls().is_empty());
    assert_eq!(session.log().last().unwrap().content(), DECLINED_NOTICE);
    assert!(received_bodies(&server, APPROVE_PATH).await.is_empty());
    assert_eq!(received_bodies(&server, CHAT_PATH).await.len(), 1);
}

#[tokio::test]
async fn failed_approval_request_leaves_the_gate_idle() {
    let server = MockServer::start().await;
    mount_approve(
        &server,
        ResponseTemplate::new(500).set_body_string("MCP server crashed"),
    )
    .await;
    let mut session = awaiting_approval(&server).await;

    session.approve().unwrap();
    session.settle().await;

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.pending_tool_calls().is_empty());
    let notice = session.log().last().unwrap().content();
    assert!(notice.contains("HTTP 500"));
    assert!(notice.contains("MCP server crashed"));
    assert!(session.log().iter().all(|message| !message.is_blank()));
}

#[tokio::test]
async fn resume_without_done_is_reported_as_truncated() {
    let server = MockServer::start().await;
    mount_approve(
        &server,
        event_stream_response(format!("data: {}\n\n", delta("partial"))),
    )
    .await;
    let mut session = awaiting_approval(&server).await;

    session.approve().unwrap();
    session.settle().await;

    assert_eq!(session.log().last().unwrap().content(), "partial");
    assert!(matches!(
        session.last_outcome(),
        Some(TurnOutcome::Truncated(_))
    ));
}
