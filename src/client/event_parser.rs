/// Parsing of `logsSubscribe` stream messages

use serde::Deserialize;
use serde_json::Value;

use crate::core::INSTRUCTION_CREATE_LOG;

/// One `logsNotification` payload
#[derive(Debug, Clone, PartialEq)]
pub struct LogsNotification {
    pub slot: u64,
    pub signature: String,
    /// `None` when the transaction succeeded
    pub err: Option<Value>,
    pub logs: Vec<String>,
}

/// Inbound websocket message, classified
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Acknowledgement of a subscribe request
    SubscriptionConfirmed { request_id: u64, subscription_id: u64 },
    /// Error response to a request
    RequestFailed { request_id: Option<u64>, message: String },
    Logs(LogsNotification),
    Other,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RawError>,
    params: Option<RawParams>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    result: RawResult,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    context: Option<RawContext>,
    value: Option<RawLogsValue>,
}

#[derive(Debug, Deserialize)]
struct RawContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct RawLogsValue {
    signature: String,
    err: Option<Value>,
    #[serde(default)]
    logs: Vec<String>,
}

/// Classify a raw websocket text frame. Unparseable text is `None`.
pub fn parse_stream_message(text: &str) -> Option<StreamMessage> {
    let raw: RawMessage = serde_json::from_str(text).ok()?;

    if let Some(error) = raw.error {
        return Some(StreamMessage::RequestFailed {
            request_id: raw.id,
            message: error.message,
        });
    }

    if let (Some(request_id), Some(result)) = (raw.id, raw.result.as_ref()) {
        if let Some(subscription_id) = result.as_u64() {
            return Some(StreamMessage::SubscriptionConfirmed { request_id, subscription_id });
        }
    }

    let message = raw
        .params
        .and_then(|params| {
            let slot = params.result.context.map(|c| c.slot).unwrap_or(0);
            params.result.value.map(|value| {
                StreamMessage::Logs(LogsNotification {
                    slot,
                    signature: value.signature,
                    err: value.err.filter(|e| !e.is_null()),
                    logs: value.logs,
                })
            })
        })
        .unwrap_or(StreamMessage::Other);

    Some(message)
}

/// True when an invoke of `program_id` is immediately followed by a Create log line
pub fn detect_create_instruction(logs: &[String], program_id: &str) -> bool {
    let invoke = format!("Program {} invoke", program_id);
    logs.windows(2)
        .any(|pair| pair[0].contains(&invoke) && pair[1].contains(INSTRUCTION_CREATE_LOG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PUMP_FUN_PROGRAM;

    fn logs(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_subscription_confirmation() {
        let msg = parse_stream_message(r#"{"jsonrpc":"2.0","result":4242,"id":1}"#).unwrap();
        assert_eq!(msg, StreamMessage::SubscriptionConfirmed { request_id: 1, subscription_id: 4242 });
    }

    #[test]
    fn test_request_error() {
        let msg = parse_stream_message(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":1}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            StreamMessage::RequestFailed { request_id: Some(1), message: "Invalid params".to_string() }
        );
    }

    #[test]
    fn test_logs_notification() {
        let text = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": { "slot": 312 },
                    "value": {
                        "signature": "5abc",
                        "err": null,
                        "logs": ["Program 111 invoke [1]", "Program 111 success"]
                    }
                },
                "subscription": 4242
            }
        })
        .to_string();

        match parse_stream_message(&text).unwrap() {
            StreamMessage::Logs(n) => {
                assert_eq!(n.slot, 312);
                assert_eq!(n.signature, "5abc");
                assert_eq!(n.err, None);
                assert_eq!(n.logs.len(), 2);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_garbage_and_unrelated_messages() {
        assert_eq!(parse_stream_message("not json"), None);
        assert_eq!(parse_stream_message(r#"{"jsonrpc":"2.0"}"#), Some(StreamMessage::Other));
    }

    #[test]
    fn test_detect_create_instruction() {
        let create = logs(&[
            "Program ComputeBudget111111111111111111111111111111 invoke [1]",
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P invoke [1]",
            "Program log: Instruction: Create",
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P success",
        ]);
        assert!(detect_create_instruction(&create, PUMP_FUN_PROGRAM));

        let buy = logs(&[
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P invoke [1]",
            "Program log: Instruction: Buy",
        ]);
        assert!(!detect_create_instruction(&buy, PUMP_FUN_PROGRAM));

        // Create log must directly follow the program invoke
        let detached = logs(&[
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P invoke [1]",
            "Program data: abc",
            "Program log: Instruction: Create",
        ]);
        assert!(!detect_create_instruction(&detached, PUMP_FUN_PROGRAM));

        assert!(!detect_create_instruction(&[], PUMP_FUN_PROGRAM));
    }
}
