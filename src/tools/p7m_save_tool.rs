use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::session_error_payload;
use crate::utils::session::DocumentSession;

pub static P7M_SAVE_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "p7m-save".to_string(),
    description: "Write the PDF recovered by p7m-open to disk. The file name is the \
                  original name without .p7m, ending in .pdf."
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "outputDir": {
                "type": "string",
                "description": "Directory to write into (default: server output directory, else next to the .p7m file)"
            }
        }
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Save Extracted PDF".to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(true),
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Default, Deserialize)]
struct P7mSaveParams {
    #[serde(rename = "outputDir")]
    output_dir: Option<String>,
}

pub struct P7mSaveTool {
    default_dir: Option<PathBuf>,
}

impl P7mSaveTool {
    pub fn new(default_dir: Option<PathBuf>) -> Self {
        Self { default_dir }
    }

    pub async fn execute(
        &self,
        session: &DocumentSession,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<P7mSaveParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid p7m-save parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => P7mSaveParams::default(),
        };

        let dir = params
            .output_dir
            .map(PathBuf::from)
            .or_else(|| self.default_dir.clone());

        match session.export(dir.as_deref()).await {
            Ok(written) => {
                info!("Saved extracted PDF to {}", written.display());
                CallToolResult::success(format!("Saved PDF to {}", written.display()))
            }
            Err(e) => {
                warn!("Failed to save PDF: {}", e);
                CallToolResult::error(session_error_payload(
                    &e,
                    json!({ "outputDir": dir.map(|d| d.display().to_string()) }),
                ))
            }
        }
    }
}
