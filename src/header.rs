//! The `lines:timeout` control header prefixed to every wire request.
//!
//! A header tells the multiplexer how much child output completes a
//! response: at most `lines` stdout lines (negative = unlimited), waiting at
//! most `timeout` milliseconds between consecutive lines (zero = use the
//! server default).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SockError;

/// Read unlimited lines until the default timeout.
pub const DEFAULT_HEADER: &str = "-1:";

/// Command not allowed; never sent to the wrapper.
pub const FORBIDDEN_HEADER: &str = "-:";

/// Do not wait for any response.
pub const EMPTY_HEADER: &str = ":";

static HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^-?[0-9]*:[0-9]*$").expect("valid header regex"));

/// Whether the given token is shaped like a wire header.
///
/// Note that the forbidden sentinel `-:` matches the shape but never decodes;
/// it exists so a parse function can reject a command client-side.
pub fn is_header_token(token: &str) -> bool {
    HEADER_REGEX.is_match(token)
}

/// Decoded form of a wire header.
///
/// `lines < 0` means unlimited; `timeout_ms <= 0` means the response
/// collector substitutes its default inter-line timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub lines: i64,
    pub timeout_ms: i64,
}

impl Header {
    pub fn new(lines: i64, timeout_ms: i64) -> Self {
        Self { lines, timeout_ms }
    }

    /// Parse a wire header token.
    ///
    /// Empty components decode to zero. Any token that fails the header
    /// shape or integer decode (including the bare `-:` sentinel) is
    /// [`SockError::MissingHeader`].
    pub fn parse(token: &str) -> Result<Self, SockError> {
        if !is_header_token(token) {
            return Err(SockError::MissingHeader);
        }
        let (lines, timeout) = token.split_once(':').ok_or(SockError::MissingHeader)?;
        let lines = match lines {
            "" => 0,
            s => s.parse().map_err(|_| SockError::MissingHeader)?,
        };
        let timeout_ms = match timeout {
            "" => 0,
            s => s.parse().map_err(|_| SockError::MissingHeader)?,
        };
        Ok(Self { lines, timeout_ms })
    }

    /// Serialize to the wire form, eliding zero components.
    pub fn encode(&self) -> String {
        if self.timeout_ms <= 0 {
            if self.lines == 0 {
                return EMPTY_HEADER.to_string();
            }
            return format!("{}:", self.lines);
        }
        if self.lines == 0 {
            return format!(":{}", self.timeout_ms);
        }
        format!("{}:{}", self.lines, self.timeout_ms)
    }

    /// Whether the line budget is exhausted at the given count.
    pub fn line_budget_reached(&self, count: i64) -> bool {
        self.lines >= 0 && count >= self.lines
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_canonical_forms() {
        assert_eq!(Header::new(-1, 0).encode(), DEFAULT_HEADER);
        assert_eq!(Header::new(0, 0).encode(), EMPTY_HEADER);
        assert_eq!(Header::new(2, 0).encode(), "2:");
        assert_eq!(Header::new(0, 500).encode(), ":500");
        assert_eq!(Header::new(3, 250).encode(), "3:250");
        // Negative timeout collapses to the default-timeout form
        assert_eq!(Header::new(5, -7).encode(), "5:");
    }

    #[test]
    fn test_parse_canonical_forms() {
        assert_eq!(Header::parse("-1:").unwrap(), Header::new(-1, 0));
        assert_eq!(Header::parse(":").unwrap(), Header::new(0, 0));
        assert_eq!(Header::parse("2:").unwrap(), Header::new(2, 0));
        assert_eq!(Header::parse(":500").unwrap(), Header::new(0, 500));
        assert_eq!(Header::parse("3:250").unwrap(), Header::new(3, 250));
    }

    #[test]
    fn test_parse_negative_lines() {
        // Any negative line count means unlimited; -0 is just 0
        assert_eq!(Header::parse("-5:").unwrap(), Header::new(-5, 0));
        assert!(Header::parse("-5:").unwrap().lines < 0);
        assert_eq!(Header::parse("-0:").unwrap(), Header::new(0, 0));
    }

    #[test]
    fn test_parse_rejects_forbidden_sentinel() {
        // "-:" is client-side only; on the wire it is a missing header
        assert!(matches!(
            Header::parse(FORBIDDEN_HEADER),
            Err(SockError::MissingHeader)
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for token in ["", "xyz", "1", "1:2:3", " 1:", "1: ", "--1:", "1:-2", "a:b"] {
            assert!(
                matches!(Header::parse(token), Err(SockError::MissingHeader)),
                "token {:?} should not parse",
                token
            );
        }
    }

    #[test]
    fn test_encode_parse_round_trip() {
        for (lines, timeout) in [(-1, 0), (0, 0), (0, 250), (1, 0), (7, 1500), (100, 1)] {
            let header = Header::new(lines, timeout);
            assert_eq!(Header::parse(&header.encode()).unwrap(), header);
        }
    }

    #[test]
    fn test_is_header_token() {
        assert!(is_header_token(DEFAULT_HEADER));
        assert!(is_header_token(EMPTY_HEADER));
        assert!(is_header_token(FORBIDDEN_HEADER));
        assert!(is_header_token("12:3400"));
        assert!(!is_header_token("hello"));
        assert!(!is_header_token("12"));
        assert!(!is_header_token("1.5:"));
    }

    #[test]
    fn test_line_budget() {
        assert!(Header::new(0, 0).line_budget_reached(0));
        assert!(Header::new(2, 0).line_budget_reached(2));
        assert!(!Header::new(2, 0).line_budget_reached(1));
        // Unlimited never caps
        assert!(!Header::new(-1, 0).line_budget_reached(i64::MAX));
    }
}
