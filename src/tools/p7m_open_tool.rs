use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{error, info, warn};

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::{safe_truncate_utf8, session_error_payload};
use crate::utils::pdf::extract_text_layer_blocking;
use crate::utils::session::DocumentSession;

pub static P7M_OPEN_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "p7m-open".to_string(),
    description: "Open a signed .p7m file, recover the PDF it wraps and return its text. \
                  The document stays open until p7m-reset."
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Path of the .p7m file on the local filesystem"
            },
            "maxLength": {
                "type": "integer",
                "description": "Maximum length of text to return (default: 30000)",
                "default": 30000,
                "minimum": 1000,
                "maximum": 500000
            },
            "includeText": {
                "type": "boolean",
                "description": "Whether to extract the text layer of the PDF (default: true)",
                "default": true
            }
        },
        "required": ["path"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Open P7M Document".to_string()),
        read_only_hint: Some(true),
        destructive_hint: None,
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct P7mOpenParams {
    path: String,
    #[serde(default = "default_max_length", rename = "maxLength")]
    max_length: usize,
    #[serde(default = "default_true", rename = "includeText")]
    include_text: bool,
}

fn default_max_length() -> usize {
    30000
}

fn default_true() -> bool {
    true
}

pub struct P7mOpenTool;

impl P7mOpenTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        session: &mut DocumentSession,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<P7mOpenParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid p7m-open parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => {
                return CallToolResult::error("Missing required parameters");
            }
        };

        info!("Opening P7M document: {}", params.path);
        let doc = match session.load(Path::new(&params.path)).await {
            Ok(doc) => doc.clone(),
            Err(e) => {
                warn!("Failed to open {}: {}", params.path, e);
                return CallToolResult::error(session_error_payload(
                    &e,
                    json!({ "path": params.path }),
                ));
            }
        };

        let mut summary = format!(
            "Document: {}\nSource: {}\nPDF size: {} bytes\nEnvelope prefixes stripped: {}",
            doc.download_name,
            doc.source_path.display(),
            doc.pdf.len(),
            doc.report.removed_per_pass.iter().sum::<usize>()
        );

        if !params.include_text {
            return CallToolResult::success(summary);
        }

        match extract_text_layer_blocking(doc.pdf).await {
            Ok(layer) if !layer.has_text() => {
                summary.push_str(&format!(
                    "\nPages: {}\nText layer: empty (no extractable text, possibly a scan)",
                    layer.page_count()
                ));
                CallToolResult::success(summary)
            }
            Ok(layer) => {
                let text = layer.joined();
                summary.push_str(&format!("\nPages: {}\nText layer: ok", layer.page_count()));
                let body = if text.len() > params.max_length {
                    summary.push_str(&format!(
                        "\nText truncated from {} to {} characters",
                        text.len(),
                        params.max_length
                    ));
                    safe_truncate_utf8(
                        &text,
                        params.max_length,
                        "... [Content truncated due to length]",
                    )
                } else {
                    text
                };
                CallToolResult::success(format!("{}\n---\n{}", summary, body))
            }
            Err(e) => {
                // the bytes were recovered and stay open for p7m-save
                warn!("PDF could not be parsed for {}: {:#}", doc.download_name, e);
                summary.push_str(&format!("\nText layer: unparsable ({})", e));
                CallToolResult::success(summary)
            }
        }
    }
}
