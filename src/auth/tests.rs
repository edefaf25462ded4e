use super::*;

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn none_policy_ignores_token_source() {
        let resolved = ChannelAuth::None
            .resolve(&StaticToken("secret".to_string()))
            .unwrap();
        assert_eq!(resolved, ResolvedAuth::default());
    }

    #[test]
    fn query_policy_encodes_token() {
        let resolved = ChannelAuth::Query
            .resolve(&StaticToken("a b&c".to_string()))
            .unwrap();
        assert_eq!(resolved.query.as_deref(), Some("?token=a%20b%26c"));
        assert_eq!(resolved.header, None);
    }

    #[test]
    fn header_policy_builds_bearer_value() {
        let resolved = ChannelAuth::Header
            .resolve(&StaticToken("  550e8400-e29b-41d4  ".to_string()))
            .unwrap();
        assert_eq!(resolved.header.as_deref(), Some("Bearer 550e8400-e29b-41d4"));
        assert_eq!(resolved.query, None);
    }

    #[test]
    fn missing_token_is_rejected() {
        assert_eq!(
            ChannelAuth::Query.resolve(&NoToken),
            Err(TokenError::Missing)
        );
        assert_eq!(
            ChannelAuth::Header.resolve(&NoToken),
            Err(TokenError::Missing)
        );
    }

    #[test]
    fn empty_token_is_rejected() {
        assert_eq!(
            ChannelAuth::Query.resolve(&StaticToken("   ".to_string())),
            Err(TokenError::Empty)
        );
    }

    #[test]
    fn header_token_with_inner_whitespace_is_rejected() {
        assert_eq!(
            ChannelAuth::Header.resolve(&StaticToken("abc def".to_string())),
            Err(TokenError::InvalidFormat)
        );
    }
}

#[cfg(test)]
mod token_source_tests {
    use super::*;

    #[test]
    fn env_token_reads_variable_on_each_call() {
        let source = EnvToken::new("LABWATCH_TEST_TOKEN_SOURCE");
        std::env::remove_var("LABWATCH_TEST_TOKEN_SOURCE");
        assert_eq!(source.token(), None);

        std::env::set_var("LABWATCH_TEST_TOKEN_SOURCE", "rotated");
        assert_eq!(source.token().as_deref(), Some("rotated"));
        std::env::remove_var("LABWATCH_TEST_TOKEN_SOURCE");
    }

    #[test]
    fn policy_deserializes_lowercase() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            mode: ChannelAuth,
        }

        let w: Wrapper = toml::from_str(r#"mode = "header""#).unwrap();
        assert_eq!(w.mode, ChannelAuth::Header);
    }
}
