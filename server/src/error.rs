//! Stable error codes for log lines.
//!
//! Every server error enum implements [`ErrorCode`] so failures can be
//! grepped by code (`code = "E_DATABASE"`) independent of their message text.

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl ErrorCode for Boom {
        fn error_code(&self) -> &'static str {
            "E_BOOM"
        }
    }

    #[test]
    fn retryable_defaults_to_false() {
        assert_eq!(Boom.error_code(), "E_BOOM");
        assert!(!Boom.retryable());
    }
}
