//! Distinguished-name helpers.

/// Extract the value of the leading RDN of a distinguished name.
///
/// `uid=alice,ou=People,dc=example,dc=com` yields `alice`. The leading RDN
/// ends at the first unescaped `,`; for a multi-valued RDN
/// (`uid=alice+cn=Alice`) the first value is returned. Backslash escapes,
/// including hex pairs such as `\2C`, are decoded.
///
/// Unescaped spaces around the value are dropped; escaped ones (`\20`, `\ `)
/// are kept. Malformed input never fails: an RDN without `=` yields an
/// empty string.
pub fn parse_dn(dn: &str) -> String {
    let mut value: Vec<u8> = Vec::new();
    // Length of `value` through the last escaped character.
    let mut escaped_len = 0;
    let mut in_value = false;
    let mut chars = dn.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(next) = chars.next() else { break };
                if !in_value {
                    continue;
                }
                let hex_pair = next
                    .to_digit(16)
                    .zip(chars.peek().and_then(|c| c.to_digit(16)));
                match hex_pair {
                    Some((hi, lo)) => {
                        chars.next();
                        value.push((hi * 16 + lo) as u8);
                    }
                    None => push_char(&mut value, next),
                }
                escaped_len = value.len();
            }
            ',' | '+' => break,
            '=' if !in_value => in_value = true,
            _ if in_value && value.is_empty() && c.is_ascii_whitespace() => {}
            _ if in_value => push_char(&mut value, c),
            _ => {}
        }
    }

    while value.len() > escaped_len && value.last().is_some_and(u8::is_ascii_whitespace) {
        value.pop();
    }
    String::from_utf8_lossy(&value).into_owned()
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}
