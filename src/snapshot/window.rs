//! Positional fallback tier: locate field markers in the raw text and read values
//! within a bounded lookahead window. Used when no tree can be built at all.

use super::{
    lenient::{RISKY_PORT_TYPE, SUSPICIOUS_CONNECTION_TYPE},
    model::{InterfaceRecord, RiskyPortFinding},
    ScanWindows,
};
use std::str::Chars;

use crate::enums::RiskLevel;

const NAME_MARKER: &str = "\"name\"";
const TYPE_MARKER: &str = "\"type\"";

pub fn interfaces(raw: &str, windows: &ScanWindows) -> Vec<InterfaceRecord> {
    let Some(block) = interfaces_block(raw) else {
        return Vec::new();
    };

    let starts: Vec<usize> = block.match_indices(NAME_MARKER).map(|(i, _)| i).collect();
    let mut records: Vec<InterfaceRecord> = Vec::new();

    for (idx, &start) in starts.iter().enumerate() {
        let mut end = clamp_to_char(block, start + windows.interface);
        if let Some(&next) = starts.get(idx + 1) {
            end = end.min(next);
        }
        let window = &block[start..end];

        let Some(name) = string_value(window, NAME_MARKER).filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        if records.iter().any(|r| r.name == name) {
            continue;
        }
        records.push(InterfaceRecord {
            name,
            ipv4: string_value(window, "\"ipv4\""),
            mac: string_value(window, "\"mac\""),
            is_up: bool_value(window, "\"is_up\"").unwrap_or(false),
            is_wireless: bool_value(window, "\"is_wireless\"").unwrap_or(false),
        });
    }
    records
}

pub fn risky_ports(raw: &str, windows: &ScanWindows) -> Vec<RiskyPortFinding> {
    let type_starts: Vec<usize> = raw.match_indices(TYPE_MARKER).map(|(i, _)| i).collect();

    let mut ports = Vec::new();
    for (idx, &start) in type_starts.iter().enumerate() {
        let mut end = clamp_to_char(raw, start + windows.finding);
        if let Some(&next) = type_starts.get(idx + 1) {
            end = end.min(next);
        }
        let window = &raw[start..end];
        if string_value(window, TYPE_MARKER).as_deref() != Some(RISKY_PORT_TYPE) {
            continue;
        }
        let Some(port) = number_value(window, "\"port\"").and_then(|p| u16::try_from(p).ok()) else {
            continue;
        };
        ports.push(RiskyPortFinding {
            port,
            service: string_value(window, "\"service\"").unwrap_or_default(),
            binding: string_value(window, "\"binding\"").unwrap_or_default(),
            risk_level: RiskLevel::parse(&string_value(window, "\"risk_level\"").unwrap_or_default()),
        });
    }
    ports
}

pub fn suspicious_connections(raw: &str) -> usize {
    raw.matches(&format!("\"{}\"", SUSPICIOUS_CONNECTION_TYPE)).count()
}

pub fn firewall_enabled(raw: &str) -> bool {
    bool_value(raw, "\"firewall_enabled\"").unwrap_or(false)
}

/// Text from the `"interfaces"` key to its closing bracket, or to the end of a
/// truncated document.
fn interfaces_block(raw: &str) -> Option<&str> {
    let key = raw.find("\"interfaces\"")?;
    let open = key + raw[key..].find('[')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in raw[open..].char_indices() {
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
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[open..open + offset + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&raw[open..])
}

fn clamp_to_char(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Everything after `marker` and its colon, left-trimmed.
fn after_marker<'a>(window: &'a str, marker: &str) -> Option<&'a str> {
    let at = window.find(marker)?;
    let rest = window[at + marker.len()..].trim_start();
    Some(rest.strip_prefix(':')?.trim_start())
}

/// A JSON string value with its escapes decoded.
fn string_value(window: &str, marker: &str) -> Option<String> {
    let rest = after_marker(window, marker)?.strip_prefix('"')?;
    let mut value = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => value.push(unescape(&mut chars)?),
            _ => value.push(c),
        }
    }
    // unterminated: the window or the document ended mid-value
    None
}

fn unescape(chars: &mut Chars<'_>) -> Option<char> {
    let c = match chars.next()? {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'u' => {
            let unit = hex4(chars)?;
            if (0xD800..0xDC00).contains(&unit) {
                let mut ahead = chars.clone();
                let low = match (ahead.next(), ahead.next()) {
                    (Some('\\'), Some('u')) => hex4(&mut ahead).filter(|low| (0xDC00..0xE000).contains(low)),
                    _ => None,
                };
                match low {
                    Some(low) => {
                        *chars = ahead;
                        char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00))?
                    }
                    None => char::REPLACEMENT_CHARACTER,
                }
            } else {
                char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
            }
        }
        // \" \\ \/ and anything unknown stand for themselves
        other => other,
    };
    Some(c)
}

fn hex4(chars: &mut Chars<'_>) -> Option<u32> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

/// Accepts the same forms as the structural tier: `true`/`false`, their quoted
/// spellings in any case, and numbers (non-zero is true).
fn bool_value(window: &str, marker: &str) -> Option<bool> {
    let rest = after_marker(window, marker)?;
    let (rest, quoted) = match rest.strip_prefix('"') {
        Some(inner) => (inner, true),
        None => (rest, false),
    };
    let token: String = rest.chars().take_while(char::is_ascii_alphanumeric).collect();
    match token.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        "1" => Some(true),
        "0" => Some(false),
        digits if !quoted => digits.parse::<u64>().ok().map(|n| n != 0),
        _ => None,
    }
}

fn number_value(window: &str, marker: &str) -> Option<u64> {
    let rest = after_marker(window, marker)?;
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_INTERFACES: &str = r#"{ "interfaces": [
        { "name": "eth0", "description": "wired" },
        { "name": "wlan0", "ipv4": "192.168.1.20", "mac": "aa:bb:cc:dd:ee:ff", "is_up": true, "is_wireless": true }
    ] <<< truncated"#;

    #[test]
    fn fields_never_leak_from_the_next_record() {
        let records = interfaces(TWO_INTERFACES, &ScanWindows::default());
        assert_eq!(records.len(), 2);

        let eth0 = &records[0];
        assert_eq!(eth0.name, "eth0");
        assert_eq!(eth0.ipv4, None);
        assert_eq!(eth0.mac, None);
        assert!(!eth0.is_up);
        assert!(!eth0.is_wireless);

        let wlan0 = &records[1];
        assert_eq!(wlan0.ipv4.as_deref(), Some("192.168.1.20"));
        assert!(wlan0.is_up && wlan0.is_wireless);
    }

    #[test]
    fn lookahead_window_bounds_field_search() {
        let raw = r#"{"interfaces": [{"name": "eth0",                                  "ipv4": "10.0.0.2"}]"#;
        let narrow = ScanWindows { interface: 20, finding: 1000 };
        assert_eq!(interfaces(raw, &narrow)[0].ipv4, None);
        assert_eq!(interfaces(raw, &ScanWindows::default())[0].ipv4.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn findings_scanned_across_document() {
        let raw = r#"garbage { "type": "risky_port", "port": 23, "service": "telnet",
            "binding": "0.0.0.0:23", "risk_level": "HIGH" },
            { "type": "suspicious_connection", "port": 4444 },
            { "type": "suspicious_connection", "port": 5555 },
            { "type": "risky_port", "service": "no-port" }
            "firewall_enabled" : true"#;
        let ports = risky_ports(raw, &ScanWindows::default());
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 23);
        assert_eq!(ports[0].binding, "0.0.0.0:23");
        assert_eq!(ports[0].risk_level, RiskLevel::High);
        assert_eq!(suspicious_connections(raw), 2);
        assert!(firewall_enabled(raw));
    }

    #[test]
    fn booleans_accept_quoted_and_numeric_forms() {
        let raw = r#""a": true, "b": "False", "c": 1, "d": "0", "e": 0, "f": "yes", "g": 7"#;
        assert_eq!(bool_value(raw, "\"a\""), Some(true));
        assert_eq!(bool_value(raw, "\"b\""), Some(false));
        assert_eq!(bool_value(raw, "\"c\""), Some(true));
        assert_eq!(bool_value(raw, "\"d\""), Some(false));
        assert_eq!(bool_value(raw, "\"e\""), Some(false));
        assert_eq!(bool_value(raw, "\"f\""), None);
        assert_eq!(bool_value(raw, "\"g\""), Some(true));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let raw = r#""name": "a\nb\t\u0041\u00e9\ud83d\ude00\"q\\\/", "next": 1"#;
        assert_eq!(string_value(raw, NAME_MARKER).as_deref(), Some("a\nb\tA\u{e9}\u{1f600}\"q\\/"));
        let lone = r#""name": "x\ud800y""#;
        assert_eq!(string_value(lone, NAME_MARKER).as_deref(), Some("x\u{fffd}y"));
        assert_eq!(string_value(r#""name": "bad\u00"#, NAME_MARKER), None);
    }

    #[test]
    fn missing_block_yields_nothing() {
        assert!(interfaces("no snapshot here", &ScanWindows::default()).is_empty());
        assert!(!firewall_enabled("\"firewall_enabled\": false"));
    }
}
