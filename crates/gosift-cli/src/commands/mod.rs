//! Subcommand implementations.

pub mod check;
pub mod toolchain;

/// Parse a boolean the way Go's `strconv.ParseBool` does, for environment
/// variables shared with Go tools.
pub fn parse_go_bool(s: &str) -> Result<bool, String> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(format!("invalid boolean '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_bool() {
        assert_eq!(parse_go_bool("T"), Ok(true));
        assert_eq!(parse_go_bool("True"), Ok(true));
        assert_eq!(parse_go_bool("0"), Ok(false));
        assert_eq!(parse_go_bool(""), Ok(false));
        assert!(parse_go_bool("yes").is_err());
    }
}
