//! Control-channel reply framing.
//!
//! A reply is a three-digit code followed by a space (single line) or a
//! hyphen (multi-line, terminated by a line starting with the same code
//! and a space). Lines arrive CRLF-terminated on a byte stream; the
//! session buffers them until a complete reply is available.

use crate::SourceError;

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub code: u16,
    pub message: String,
}

/// True once the accumulated lines form a complete reply.
pub(crate) fn reply_complete(lines: &[String]) -> bool {
    let Some(first) = lines.first() else {
        return false;
    };
    let first = first.trim();
    if first.len() < 3 || !first.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
        // Not a framed reply; let the parser surface the error.
        return true;
    }
    if first.as_bytes().get(3) != Some(&b'-') {
        return true;
    }
    let code = &first[..3];
    let last = lines.last().map(|l| l.trim()).unwrap_or_default();
    last.starts_with(&format!("{code} ")) || last == code
}

impl Reply {
    /// Parse a complete set of reply lines. Multi-line messages are each
    /// line's content with its `NNN-`/`NNN ` prefix stripped, joined by
    /// newlines.
    pub(crate) fn from_lines(lines: &[String]) -> Result<Reply, SourceError> {
        let first = lines
            .first()
            .ok_or_else(|| SourceError::Protocol("empty reply".to_string()))?
            .trim();
        let digits = first
            .get(..3)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| SourceError::Protocol(format!("bad reply line: {first:?}")))?;
        let code: u16 = digits
            .parse()
            .map_err(|_| SourceError::Protocol(format!("bad reply code: {first:?}")))?;

        // Lines are server-controlled text and may hold multibyte UTF-8,
        // so the prefix is matched, never sliced by byte offset. Bare
        // continuation lines without a code prefix are kept whole.
        let strip = |line: &String| -> String {
            let trimmed = line.trim();
            trimmed
                .strip_prefix(&format!("{digits}-"))
                .or_else(|| trimmed.strip_prefix(&format!("{digits} ")))
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if trimmed == digits {
                        String::new()
                    } else {
                        trimmed.to_string()
                    }
                })
        };

        let message = if first.as_bytes().get(3) == Some(&b'-') {
            lines.iter().map(strip).collect::<Vec<_>>().join("\n")
        } else {
            strip(&lines[0])
        };
        Ok(Reply {
            code,
            message: message.trim().to_string(),
        })
    }
}

/// Parse `(h1,h2,h3,h4,p1,p2)` out of a 227 reply into host and port.
pub(crate) fn parse_pasv(message: &str) -> Option<(String, u16)> {
    let start = message.find('(')?;
    let end = message[start..].find(')')? + start;
    let parts: Vec<u16> = message[start + 1..end]
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.len() != 6 || parts.iter().any(|&p| p > 255) {
        return None;
    }
    let host = format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3]);
    let port = parts[4] * 256 + parts[5];
    Some((host, port))
}

/// Parse the `(|||port|)` payload of a 229 reply. The data host is the
/// control-connection host, only the port is negotiated.
pub(crate) fn parse_epsv(message: &str) -> Option<u16> {
    let start = message.find('(')?;
    let end = message[start..].find(')')? + start;
    let parts: Vec<&str> = message[start + 1..end].split('|').collect();
    if parts.len() < 4 {
        return None;
    }
    parts[3].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_line_reply_is_complete_immediately() {
        let l = lines(&["220 ready"]);
        assert!(reply_complete(&l));
        let reply = Reply::from_lines(&l).unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.message, "ready");
    }

    #[test]
    fn multi_line_reply_waits_for_terminator() {
        let mut l = lines(&["150-First line"]);
        assert!(!reply_complete(&l));
        l.push("150-Second line".to_string());
        assert!(!reply_complete(&l));
        l.push("150 Third line".to_string());
        assert!(reply_complete(&l));

        let reply = Reply::from_lines(&l).unwrap();
        assert_eq!(reply.code, 150);
        assert_eq!(reply.message, "First line\nSecond line\nThird line");
    }

    #[test]
    fn multi_line_terminator_must_repeat_the_code() {
        let l = lines(&["150-First", "226 done"]);
        assert!(!reply_complete(&l));
    }

    #[test]
    fn multibyte_text_is_never_split_mid_char() {
        // Continuation lines may carry the code prefix or be bare text;
        // either way non-ASCII banners must not break the framing.
        let l = lines(&["220-Willkommen", "Café Server bereit", "220 Bereit"]);
        assert!(reply_complete(&l));
        let reply = Reply::from_lines(&l).unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.message, "Willkommen\nCafé Server bereit\nBereit");

        let single = lines(&["220-Café Server bereit", "220 Los"]);
        let reply = Reply::from_lines(&single).unwrap();
        assert_eq!(reply.message, "Café Server bereit\nLos");
    }

    #[test]
    fn garbage_first_line_is_a_protocol_error_not_a_panic() {
        let l = lines(&["😀 oops"]);
        assert!(reply_complete(&l));
        assert!(Reply::from_lines(&l).is_err());
    }

    #[test]
    fn pasv_reply_yields_host_and_port() {
        let (host, port) =
            parse_pasv("Entering Passive Mode (192,168,1,10,200,15)").unwrap();
        assert_eq!(host, "192.168.1.10");
        assert_eq!(port, 200 * 256 + 15);
        assert_eq!(port, 51215);
    }

    #[test]
    fn malformed_pasv_is_rejected() {
        assert!(parse_pasv("227 no tuple here").is_none());
        assert!(parse_pasv("(1,2,3)").is_none());
        assert!(parse_pasv("(1,2,3,4,5,999)").is_none());
    }

    #[test]
    fn epsv_reply_yields_port() {
        assert_eq!(
            parse_epsv("Entering Extended Passive Mode (|||51215|)"),
            Some(51215)
        );
        assert_eq!(parse_epsv("no payload"), None);
        assert_eq!(parse_epsv("(|51215|)"), None);
    }
}
