/// Escape a value for embedding in a Drive query string literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Decode percent-encoded bytes in a URL query component.
pub fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(high), Some(low)) => {
                        out.push(high << 4 | low);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Extract a query parameter from the first line of an HTTP request,
/// e.g. `GET /?code=abc&scope=drive HTTP/1.1`.
pub fn query_param(request_line: &str, name: &str) -> Option<String> {
    let target = request_line.split_whitespace().nth(1)?;
    let query = target.split_once('?')?.1;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return Some(percent_decode(value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_query_value("it's"), "it\\'s");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
        assert_eq!(escape_query_value("plain"), "plain");
    }

    #[test]
    fn decodes_percent_sequences() {
        assert_eq!(percent_decode("4%2F0Abc"), "4/0Abc");
        assert_eq!(percent_decode("a+b"), "a b");
        assert_eq!(percent_decode("no-escapes"), "no-escapes");
        // Malformed escapes pass through untouched.
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn extracts_query_params_from_request_line() {
        let line = "GET /?code=4%2F0Abc&scope=drive HTTP/1.1";
        assert_eq!(query_param(line, "code").as_deref(), Some("4/0Abc"));
        assert_eq!(query_param(line, "scope").as_deref(), Some("drive"));
        assert_eq!(query_param(line, "error"), None);
        assert_eq!(query_param("GET / HTTP/1.1", "code"), None);
    }
}
