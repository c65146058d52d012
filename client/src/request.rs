//! Request bodies understood by the chat backend.

use serde::Serialize;
use weft_types::{HistoryEntry, ToolCall};

/// `POST {url}/chat_streaming`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model_id: String,
    pub chat_history: Vec<HistoryEntry>,
    pub use_mcp: bool,
    pub mcp_server_type: String,
    pub mcp_auto_approve: bool,
}

/// `POST {url}/mcp/approve_tool_calls_streaming`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRequest {
    pub tool_calls: Vec<ToolCall>,
    pub approved: bool,
    pub chat_history: Vec<HistoryEntry>,
    pub model_id: String,
    pub mcp_server_type: String,
}

#[cfg(test)]
mod tests {
    use super::{ApprovalRequest, ChatRequest};
    use serde_json::json;
    use weft_types::{HistoryEntry, Role, ToolCall};

    fn history() -> Vec<HistoryEntry> {
        vec![HistoryEntry {
            role: Role::User,
            content: "hi".to_string(),
            image: None,
            audio: None,
            pdf: None,
        }]
    }

    #[test]
    fn chat_request_shape() {
        let request = ChatRequest {
            model_id: "m".to_string(),
            chat_history: history(),
            use_mcp: true,
            mcp_server_type: "cmu_api".to_string(),
            mcp_auto_approve: false,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model_id": "m",
                "chat_history": [{"role": "user", "content": "hi"}],
                "use_mcp": true,
                "mcp_server_type": "cmu_api",
                "mcp_auto_approve": false,
            })
        );
    }

    #[test]
    fn approval_request_forwards_tool_calls_verbatim() {
        let request = ApprovalRequest {
            tool_calls: vec![ToolCall::new("c1", "search", r#"{"q":"rust"}"#)],
            approved: true,
            chat_history: history(),
            model_id: "m".to_string(),
            mcp_server_type: "cmu_api".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["approved"], true);
        assert_eq!(value["tool_calls"][0]["id"], "c1");
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["arguments"], r#"{"q":"rust"}"#);
    }
}
