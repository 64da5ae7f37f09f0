use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, Stdin, Stdout};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error};

use super::types::{
    McpError, McpMessage, McpNotification, McpRequest, McpResponse, INVALID_REQUEST, PARSE_ERROR,
};

/// Newline-delimited JSON-RPC over any async byte pipe.
pub struct LineTransport<R, W> {
    reader: FramedRead<BufReader<R>, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

pub type StdioTransport = LineTransport<Stdin, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(BufReader::new(reader), LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Next message, or `None` once the peer closes the stream. Blank lines are skipped.
    /// Only read failures are errors; a malformed line comes back as `McpMessage::Invalid`.
    pub async fn read_message(&mut self) -> Result<Option<McpMessage>> {
        loop {
            match self.reader.next().await {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    return Ok(Some(
                        parse_message(&line).unwrap_or_else(McpMessage::Invalid),
                    ));
                }
                Some(Err(e)) => {
                    error!("Error reading from input: {}", e);
                    return Err(anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: McpResponse) -> Result<()> {
        let json = serde_json::to_string(&response)?;
        debug!("Sending: {}", json);
        self.writer.send(json).await?;
        Ok(())
    }
}

/// Requests carry an `id`; anything else is a notification. Lines that are not
/// JSON map to a parse error, JSON that is not a message to an invalid request.
pub fn parse_message(line: &str) -> std::result::Result<McpMessage, McpError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        error!("Failed to parse JSON: {}", e);
        McpError::new(PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let is_request = match value.as_object() {
        Some(obj) => obj.contains_key("id"),
        None => {
            error!("Invalid JSON-RPC message structure");
            return Err(McpError::new(
                INVALID_REQUEST,
                "Invalid Request: expected a JSON object",
            ));
        }
    };

    if is_request {
        serde_json::from_value::<McpRequest>(value)
            .map(McpMessage::Request)
            .map_err(|e| {
                error!("Failed to parse request: {}", e);
                McpError::new(INVALID_REQUEST, format!("Invalid Request: {}", e))
            })
    } else {
        serde_json::from_value::<McpNotification>(value)
            .map(McpMessage::Notification)
            .map_err(|e| {
                error!("Failed to parse notification: {}", e);
                McpError::new(INVALID_REQUEST, format!("Invalid Request: {}", e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn classifies_requests_and_notifications() {
        let req = parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert!(matches!(req, McpMessage::Request(r) if r.method == "ping"));

        let note =
            parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(note, McpMessage::Notification(_)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_message("not json").unwrap_err().code, PARSE_ERROR);
        assert_eq!(parse_message("{not json").unwrap_err().code, PARSE_ERROR);
        assert_eq!(parse_message("[1,2]").unwrap_err().code, INVALID_REQUEST);
        assert_eq!(parse_message(r#"{"id":1}"#).unwrap_err().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn malformed_line_is_returned_not_raised() {
        let (mut client, server_in) = tokio::io::duplex(4096);
        let (server_out, _client_out) = tokio::io::duplex(4096);
        let mut transport = LineTransport::new(server_in, server_out);

        client
            .write_all(b"{not json\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        drop(client);

        match transport.read_message().await.unwrap() {
            Some(McpMessage::Invalid(err)) => assert_eq!(err.code, PARSE_ERROR),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(matches!(
            transport.read_message().await.unwrap(),
            Some(McpMessage::Request(_))
        ));
    }

    #[tokio::test]
    async fn reads_lines_and_writes_responses() {
        let (mut client, server_in) = tokio::io::duplex(4096);
        let (server_out, mut client_out) = tokio::io::duplex(4096);
        let mut transport = LineTransport::new(server_in, server_out);

        client
            .write_all(b"\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        drop(client);

        match transport.read_message().await.unwrap() {
            Some(McpMessage::Request(r)) => assert_eq!(r.id, Some(json!(3))),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(transport.read_message().await.unwrap().is_none());

        transport
            .write_response(McpResponse::success(json!(3), json!({})))
            .await
            .unwrap();
        drop(transport);

        let mut out = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client_out, &mut out)
            .await
            .unwrap();
        assert_eq!(out, "{\"result\":{},\"jsonrpc\":\"2.0\",\"id\":3}\n");
    }
}
