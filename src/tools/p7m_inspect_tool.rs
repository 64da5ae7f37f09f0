use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{error, info, warn};

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::session_error_payload;
use crate::utils::p7m_extract::Extractor;
use crate::utils::session::{read_envelope, run_blocking, SessionError};
use crate::utils::strip_patterns::STRIP_TABLE_VERSION;

/// Upper bound on passes when looking for the point where stripping stops changing the buffer.
const MAX_CONVERGENCE_PASSES: usize = 16;

pub static P7M_INSPECT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "p7m-inspect".to_string(),
    description: "Report how the PDF inside a .p7m file is located: bytes stripped per pass, \
                  marker offsets, payload size, and how many passes stripping needs to settle"
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Path of the .p7m file on the local filesystem"
            }
        },
        "required": ["path"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Inspect P7M Envelope".to_string()),
        read_only_hint: Some(true),
        destructive_hint: None,
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct P7mInspectParams {
    path: String,
}

pub struct P7mInspectTool {
    extractor: Extractor<'static>,
    max_input_bytes: u64,
}

impl P7mInspectTool {
    pub fn new(extractor: Extractor<'static>, max_input_bytes: u64) -> Self {
        Self {
            extractor,
            max_input_bytes,
        }
    }

    pub async fn execute(&self, arguments: Option<serde_json::Value>) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<P7mInspectParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid p7m-inspect parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => {
                return CallToolResult::error("Missing required parameters");
            }
        };

        let path = Path::new(&params.path);
        let envelope = match read_envelope(path, self.max_input_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot inspect {}: {}", params.path, e);
                return CallToolResult::error(session_error_payload(
                    &e,
                    json!({ "path": params.path }),
                ));
            }
        };

        info!("Inspecting P7M envelope: {} ({} bytes)", params.path, envelope.len());
        let extractor = self.extractor;
        let input_len = envelope.len();
        let work = run_blocking(move || {
            let (stable, converged) = extractor
                .stripper()
                .strip_until_stable(&envelope, MAX_CONVERGENCE_PASSES);
            // the last recorded pass is the one that found nothing
            let passes_to_settle = converged.then(|| stable.removed_per_pass.len() - 1);
            (passes_to_settle, extractor.extract_with_report(&envelope))
        });
        let (passes_to_settle, outcome) = match work.await {
            Ok(done) => done,
            Err(e) => {
                return CallToolResult::error(session_error_payload(
                    &e,
                    json!({ "path": params.path }),
                ));
            }
        };

        let convergence = json!({
            "patternCount": extractor.stripper().patterns().len(),
            "configuredPasses": extractor.passes(),
            "passesToSettle": passes_to_settle,
            "settledWithinConfigured": passes_to_settle.map(|n| n <= extractor.passes()),
        });

        match outcome {
            Ok((_, report)) => {
                let body = json!({
                    "path": params.path,
                    "report": report,
                    "convergence": convergence,
                });
                match serde_json::to_string_pretty(&body) {
                    Ok(text) => CallToolResult::success(text),
                    Err(e) => CallToolResult::error(format!("Failed to render report: {}", e)),
                }
            }
            Err(e) => {
                let err = SessionError::from(e);
                CallToolResult::error(session_error_payload(
                    &err,
                    json!({
                        "path": params.path,
                        "tableVersion": STRIP_TABLE_VERSION,
                        "inputLen": input_len,
                        "convergence": convergence,
                    }),
                ))
            }
        }
    }
}
