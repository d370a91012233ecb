use crate::object::{Object, StringFormat};
use chrono::{DateTime, FixedOffset};
use std::str;

impl Object {
    /// Read a literal string of the form `D:YYYYMMDDHHmmSSOHH'mm'` as a
    /// timestamp.
    ///
    /// Truncated dates are padded out to a full local time, a trailing `Z`
    /// or a missing zone becomes `+0000`, and the `'` separators inside a
    /// UT offset are dropped so the offset itself survives. Anything that
    /// still does not parse yields `None` and the raw bytes stay available
    /// through [`Object::as_str`].
    pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Object::String(bytes, StringFormat::Literal) => parse_date(bytes),
            _ => None,
        }
    }
}

fn parse_date(bytes: &[u8]) -> Option<DateTime<FixedOffset>> {
    let text = str::from_utf8(bytes).ok()?.strip_prefix("D:")?;
    let mut normalized: String = text.chars().filter(|&c| c != '\'').collect();

    if normalized.ends_with('Z') {
        normalized.pop();
        normalized.push_str("+0000");
    }

    let digits = normalized.chars().take_while(char::is_ascii_digit).count();
    if digits < 14 && digits == normalized.len() {
        normalized.push_str(&"00010101000000"[digits..]);
    }
    if normalized.len() == 14 {
        normalized.push_str("+0000");
    }

    DateTime::parse_from_str(&normalized, "%Y%m%d%H%M%S%z").ok()
}
