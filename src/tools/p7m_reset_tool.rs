use once_cell::sync::Lazy;
use serde_json::json;

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::session::DocumentSession;

pub static P7M_RESET_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "p7m-reset".to_string(),
    description: "Close the open document so another .p7m file can be opened".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {}
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Reset P7M Session".to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(false),
        open_world_hint: Some(false),
    }),
});

pub struct P7mResetTool;

impl P7mResetTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, session: &mut DocumentSession) -> CallToolResult {
        let closed = session
            .current()
            .map(|doc| doc.download_name.clone());
        session.reset();
        match closed {
            Some(name) => CallToolResult::success(format!("Closed {}", name)),
            None => CallToolResult::success("No document was open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::p7m_extract::Extractor;
    use crate::utils::session::DEFAULT_MAX_INPUT_BYTES;

    #[tokio::test]
    async fn reset_unlocks_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offer.pdf.p7m");
        tokio::fs::write(&path, b"%PDF-1.4 x %%EOF").await.unwrap();

        let mut session = DocumentSession::new(Extractor::default(), DEFAULT_MAX_INPUT_BYTES);
        session.load(&path).await.unwrap();

        let tool = P7mResetTool::new();
        let result = tool.execute(&mut session);
        assert_eq!(result.first_text(), Some("Closed offer.pdf"));
        assert!(!session.is_locked());

        let result = tool.execute(&mut session);
        assert_eq!(result.first_text(), Some("No document was open"));
    }
}
