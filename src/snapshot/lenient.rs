//! Structural tier: build a generic JSON tree as leniently as possible, then pull
//! typed records out of it.

use serde_json::{Map, Value};

use super::model::{InterfaceRecord, ParseMode, RiskyPortFinding};
use crate::enums::RiskLevel;

pub const RISKY_PORT_TYPE: &str = "risky_port";
pub const SUSPICIOUS_CONNECTION_TYPE: &str = "suspicious_connection";

/// Strict JSON, then JSON5, then JSON5 over a repaired (closed-off) document.
pub fn parse_tree(raw: &str) -> Option<(Value, ParseMode)> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some((value, ParseMode::Strict));
    }
    if let Ok(value) = json5::from_str::<Value>(raw) {
        return Some((value, ParseMode::Lenient));
    }
    let repaired = close_truncated(raw);
    match json5::from_str::<Value>(&repaired) {
        Ok(value) => Some((value, ParseMode::Repaired)),
        Err(e) => {
            log::debug!("Snapshot tree parse failed after repair: {}", e);
            None
        }
    }
}

/// Close a document cut off mid-write: terminate an open string, drop a dangling
/// separator or key, and append the missing closers.
pub fn close_truncated(raw: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in raw.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = raw.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let trimmed = out.trim_end();
        if let Some(stripped) = trimmed.strip_suffix(',') {
            out = stripped.to_string();
        } else if let Some(stripped) = trimmed.strip_suffix(':') {
            out = format!("{}: null", stripped);
            break;
        } else if stack.last() == Some(&'}') && ends_with_bare_key(trimmed) {
            // `{"a": 1, "b"` - a key without a value
            out = format!("{}: null", trimmed);
            break;
        } else {
            out = trimmed.to_string();
            break;
        }
    }

    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Whether the text ends with a string that sits in key position of an object.
fn ends_with_bare_key(text: &str) -> bool {
    if !text.ends_with('"') {
        return false;
    }
    let body = &text[..text.len() - 1];
    let mut start = None;
    let bytes = body.as_bytes();
    for i in (0..bytes.len()).rev() {
        if bytes[i] == b'"' && (i == 0 || bytes[i - 1] != b'\\') {
            start = Some(i);
            break;
        }
    }
    let Some(start) = start else {
        return false;
    };
    matches!(body[..start].trim_end().chars().last(), Some('{') | Some(','))
}

pub fn interfaces(root: &Value) -> Vec<InterfaceRecord> {
    let Some(list) = find_key(root, "interfaces").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut records: Vec<InterfaceRecord> = Vec::new();
    for entry in list.iter().filter_map(Value::as_object) {
        let Some(name) = string_field(entry, "name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        if records.iter().any(|r| r.name == name) {
            log::debug!("Duplicate interface record '{}' ignored", name);
            continue;
        }
        records.push(InterfaceRecord {
            name,
            ipv4: string_field(entry, "ipv4"),
            mac: string_field(entry, "mac"),
            is_up: bool_field(entry, "is_up").unwrap_or(false),
            is_wireless: bool_field(entry, "is_wireless").unwrap_or(false),
        });
    }
    records
}

/// Risky-port findings and the suspicious-connection tally, found anywhere in the tree.
pub fn findings(root: &Value) -> (Vec<RiskyPortFinding>, usize) {
    let mut ports = Vec::new();
    let mut suspicious = 0;
    walk_objects(root, &mut |obj| match string_field(obj, "type").as_deref() {
        Some(RISKY_PORT_TYPE) => {
            if let Some(port) = port_field(obj, "port") {
                ports.push(RiskyPortFinding {
                    port,
                    service: string_field(obj, "service").unwrap_or_default(),
                    binding: string_field(obj, "binding").unwrap_or_default(),
                    risk_level: RiskLevel::parse(&string_field(obj, "risk_level").unwrap_or_default()),
                });
            } else {
                log::debug!("Risky port finding without a usable port skipped");
            }
        }
        Some(SUSPICIOUS_CONNECTION_TYPE) => suspicious += 1,
        _ => {}
    });
    (ports, suspicious)
}

/// `firewall_enabled` at top level or nested (the collector puts it under `metadata`).
/// Absent means disabled.
pub fn firewall_enabled(root: &Value) -> bool {
    find_key(root, "firewall_enabled").and_then(as_bool).unwrap_or(false)
}

fn walk_objects<'a>(value: &'a Value, visit: &mut dyn FnMut(&'a Map<String, Value>)) {
    match value {
        Value::Object(obj) => {
            visit(obj);
            obj.values().for_each(|v| walk_objects(v, visit));
        }
        Value::Array(items) => items.iter().for_each(|v| walk_objects(v, visit)),
        _ => {}
    }
}

/// Top-level key first, then breadth-first through nested objects.
fn find_key<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(value) = queue.pop_front() {
        match value {
            Value::Object(obj) => {
                if let Some(found) = obj.get(key) {
                    return Some(found);
                }
                queue.extend(obj.values());
            }
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }
    None
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(as_bool)
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn port_field(obj: &Map<String, Value>, key: &str) -> Option<u16> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
