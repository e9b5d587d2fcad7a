use std::fmt::{Display, Formatter};

/// Record id as it appears in a request path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Lenient parse: leading whitespace, an optional sign, then the longest run of digits.
    /// Trailing garbage is ignored (`"42abc"` is 42). Returns `None` when there are no digits
    /// or the value does not fit, such an id matches no record.
    pub fn parse_lenient(s: &str) -> Option<RecordId> {
        let s = s.trim_start();
        let (negative, rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let magnitude: i64 = rest[..digits].parse().ok()?;
        Some(RecordId(if negative { -magnitude } else { magnitude }))
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
