//! Descriptive markers substituted for values JSON cannot carry.

pub const CIRCULAR: &str = "[Circular ~]";
pub const OBJECT: &str = "[Object]";
pub const ARRAY: &str = "[Array]";
pub const MAX_PROPERTIES: &str = "[MaxProperties ~]";
/// Object key under which [`MAX_PROPERTIES`] is recorded
pub const MAX_PROPERTIES_KEY: &str = "...";
pub const UNDEFINED: &str = "[undefined]";
pub const NAN: &str = "[NaN]";
pub const INFINITY: &str = "[Infinity]";
pub const NEG_INFINITY: &str = "[-Infinity]";
pub const INVALID_DATE: &str = "[Invalid Date]";
pub const ANONYMOUS: &str = "<anonymous>";
pub const BINARY_REMOVED: &str = "[binary content removed]";
/// Suffix appended to any string cut short
pub const ELLIPSIS: &str = "...";

pub fn function(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("[Function: {name}]"),
        _ => format!("[Function: {ANONYMOUS}]"),
    }
}

pub fn symbol(description: Option<&str>) -> String {
    format!("[Symbol({})]", description.unwrap_or_default())
}

pub fn bigint(value: i128) -> String {
    format!("[BigInt: {value}]")
}

/// Cut `s` to at most `max_chars` chars, appending [`ELLIPSIS`] when cut
pub fn cap_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len());
            out.push_str(&s[..byte_idx]);
            out.push_str(ELLIPSIS);
            out
        }
        None => s.to_string(),
    }
}

/// Cut `s` to at most `max_bytes` UTF-8 bytes on a char boundary
pub fn floor_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_chars_counts_chars_not_bytes() {
        assert_eq!(cap_chars("héllo", 2), "hé...");
        assert_eq!(cap_chars("héllo", 5), "héllo");
    }

    #[test]
    fn test_floor_bytes_respects_boundaries() {
        // 'é' is two bytes
        assert_eq!(floor_bytes("é", 1), "");
        assert_eq!(floor_bytes("aé", 2), "a");
        assert_eq!(floor_bytes("abc", 10), "abc");
    }

    #[test]
    fn test_function_marker() {
        assert_eq!(function(Some("handler")), "[Function: handler]");
        assert_eq!(function(None), "[Function: <anonymous>]");
        assert_eq!(function(Some("")), "[Function: <anonymous>]");
    }
}
