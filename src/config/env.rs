//! Environment variable helpers.
//!
//! Empty or whitespace-only values are treated as unset.

use std::env;
use std::str::FromStr;

/// Read a variable, trimmed. `None` when unset or blank.
pub(super) fn get_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable into `T`, reporting the variable name on failure.
pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Box::from(format!("Invalid value for {name}: {raw} ({e})"))),
        None => Ok(None),
    }
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(super) fn parse_bool_env(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match get_env(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| Box::from(format!("Invalid boolean for {name}: {raw}"))),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_blank_is_unset() {
        unsafe {
            env::set_var("TRANSCRIBE_GATEWAY_TEST_BLANK", "   ");
        }
        assert_eq!(get_env("TRANSCRIBE_GATEWAY_TEST_BLANK"), None);
        assert_eq!(
            parse_env::<u16>("TRANSCRIBE_GATEWAY_TEST_BLANK").unwrap(),
            None
        );
        unsafe {
            env::remove_var("TRANSCRIBE_GATEWAY_TEST_BLANK");
        }
    }

    #[test]
    #[serial]
    fn test_parse_env_reports_name() {
        unsafe {
            env::set_var("TRANSCRIBE_GATEWAY_TEST_NUM", "abc");
        }
        let err = parse_env::<u64>("TRANSCRIBE_GATEWAY_TEST_NUM").unwrap_err();
        assert!(err.to_string().contains("TRANSCRIBE_GATEWAY_TEST_NUM"));
        unsafe {
            env::remove_var("TRANSCRIBE_GATEWAY_TEST_NUM");
        }
    }
}
