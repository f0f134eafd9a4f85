//! Locating the structured payload inside a model reply
//!
//! Models are asked to answer with a fenced JSON block but frequently wrap it
//! in prose, use an untagged fence, or skip the fence altogether. Extraction
//! tries, in order: a ```` ```json ```` fence, any ```` ``` ```` fence, the
//! whole reply, and finally the outermost `{ ... }` span as a repair step.

use serde_json::{Map, Value};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Parse the structured payload of a reply into a JSON object
///
/// Returns `None` when no candidate parses to an object.
pub fn extract_payload(reply: &str) -> Option<Map<String, Value>> {
    candidates(reply).into_iter().find_map(parse_object)
}

fn candidates(reply: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(3);

    if let Some(body) = fenced_body(reply, JSON_FENCE) {
        out.push(body);
    } else if let Some(body) = fenced_body(reply, FENCE) {
        out.push(body);
    } else {
        out.push(reply.trim());
    }

    if let Some(span) = brace_span(reply) {
        out.push(span);
    }
    out
}

/// Text between `opener` and the next closing fence
fn fenced_body<'a>(reply: &'a str, opener: &str) -> Option<&'a str> {
    let start = reply.find(opener)? + opener.len();
    let rest = &reply[start..];
    // An untagged fence may still carry a language tag on its first line
    let rest = if opener == FENCE {
        rest.split_once('\n').map_or(rest, |(tag, body)| {
            if tag.trim().chars().all(char::is_alphanumeric) {
                body
            } else {
                rest
            }
        })
    } else {
        rest
    };
    let end = rest.find(FENCE).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn brace_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fence() {
        let reply = "分析如下：\n```json\n{\"trend\": \"上涨\", \"technical_score\": 8}\n```\n以上。";
        let map = extract_payload(reply).unwrap();
        assert_eq!(map["trend"], "上涨");
        assert_eq!(map["technical_score"], 8);
    }

    #[test]
    fn test_untagged_fence() {
        let reply = "```\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_payload(reply).unwrap()["summary"], "ok");
    }

    #[test]
    fn test_untagged_fence_with_language_line() {
        let reply = "```JSON\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_payload(reply).unwrap()["summary"], "ok");
    }

    #[test]
    fn test_bare_object() {
        let reply = "  {\"action\": \"买入\"}  ";
        assert_eq!(extract_payload(reply).unwrap()["action"], "买入");
    }

    #[test]
    fn test_repairs_prose_around_object() {
        let reply = "好的，以下是结果 {\"action\": \"持有\", \"confidence\": 6} 请参考。";
        let map = extract_payload(reply).unwrap();
        assert_eq!(map["action"], "持有");
    }

    #[test]
    fn test_unterminated_fence() {
        let reply = "```json\n{\"summary\": \"truncated reply\"}";
        assert_eq!(extract_payload(reply).unwrap()["summary"], "truncated reply");
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(extract_payload("[1, 2, 3]").is_none());
        assert!(extract_payload("看涨，目标价 1800 元").is_none());
        assert!(extract_payload("```json\n{broken\n```").is_none());
    }
}
