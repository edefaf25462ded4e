use super::*;
use crate::auth::StaticToken;

fn origin(url: &str) -> PageOrigin {
    PageOrigin::parse(url).unwrap()
}

fn target(id: u64) -> TargetId {
    TargetId::new(id).unwrap()
}

#[test]
fn test_target_id_must_be_positive() {
    assert!(TargetId::new(0).is_err());
    assert_eq!(TargetId::new(42).unwrap().get(), 42);
    assert_eq!("7".parse::<TargetId>().unwrap().get(), 7);
    assert!("-3".parse::<TargetId>().is_err());
    assert!("lab".parse::<TargetId>().is_err());
}

#[test]
fn test_parse_page_origin() {
    let o = origin("https://lab.example.com:8443/dashboard");
    assert!(o.secure);
    assert_eq!(o.host, "lab.example.com");
    assert_eq!(o.port, Some(8443));

    let o = origin("http://localhost");
    assert!(!o.secure);
    assert_eq!(o.port, None);
}

#[test]
fn test_parse_page_origin_rejects_other_schemes() {
    assert_eq!(
        PageOrigin::parse("ftp://lab.example.com"),
        Err(EndpointError::UnsupportedScheme("ftp".to_string()))
    );
    assert!(PageOrigin::parse("not a url").is_err());
}

#[test]
fn test_development_uses_fixed_port() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development);
    let endpoint = builder.build(target(42)).unwrap();

    assert_eq!(endpoint.url, "ws://localhost:8083/ws/realtime/42");
    assert_eq!(endpoint.target, target(42));
    assert_eq!(endpoint.auth_header, None);
}

#[test]
fn test_production_mirrors_page_scheme_and_port() {
    let builder = EndpointBuilder::new(
        origin("https://lab.example.com:8443"),
        Environment::Production,
    );
    let endpoint = builder.build(target(3)).unwrap();

    assert_eq!(endpoint.url, "wss://lab.example.com:8443/ws/realtime/3");
}

#[test]
fn test_production_without_page_port_omits_port() {
    let builder = EndpointBuilder::new(origin("https://lab.example.com"), Environment::Production);
    let endpoint = builder.build(target(3)).unwrap();

    assert_eq!(endpoint.url, "wss://lab.example.com/ws/realtime/3");
}

#[test]
fn test_custom_dev_port_and_prefix() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development)
        .dev_port(9000)
        .path_prefix("api/ws/realtime/");
    let endpoint = builder.build(target(1)).unwrap();

    assert_eq!(endpoint.url, "ws://localhost:9000/api/ws/realtime/1");
}

#[test]
fn test_query_auth_appends_token_and_masks_it_in_display() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development)
        .auth(ChannelAuth::Query, Arc::new(StaticToken("s3cret".to_string())));
    let endpoint = builder.build(target(42)).unwrap();

    assert_eq!(endpoint.url, "ws://localhost:8083/ws/realtime/42?token=s3cret");
    assert_eq!(
        endpoint.to_string(),
        "ws://localhost:8083/ws/realtime/42?token=***"
    );
}

#[test]
fn test_header_auth_keeps_url_clean() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development)
        .auth(ChannelAuth::Header, Arc::new(StaticToken("s3cret".to_string())));
    let endpoint = builder.build(target(42)).unwrap();

    assert_eq!(endpoint.url, "ws://localhost:8083/ws/realtime/42");
    assert_eq!(endpoint.auth_header.as_deref(), Some("Bearer s3cret"));
}

#[test]
fn test_missing_token_fails_build() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development)
        .auth(ChannelAuth::Query, Arc::new(NoToken));

    assert_eq!(
        builder.build(target(42)),
        Err(EndpointError::Auth(TokenError::Missing))
    );
}

#[test]
fn test_environment_from_str() {
    assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
    assert_eq!(
        "Production".parse::<Environment>().unwrap(),
        Environment::Production
    );
    assert!("staging".parse::<Environment>().is_err());
}

#[test]
fn test_target_from_url() {
    assert_eq!(
        target_from_url("ws://localhost:8083/ws/realtime/42", DEFAULT_PATH_PREFIX),
        Some(target(42))
    );
    assert_eq!(
        target_from_url("wss://monitor.example.org/ws/realtime/7?token=abc", "/ws/realtime/"),
        Some(target(7))
    );
    assert_eq!(
        target_from_url("ws://localhost:8083/realtime/3", "realtime"),
        Some(target(3))
    );
    assert_eq!(target_from_url("ws://localhost:8083/ws/realtime/0", DEFAULT_PATH_PREFIX), None);
    assert_eq!(target_from_url("ws://localhost:8083/ws/other/42", DEFAULT_PATH_PREFIX), None);
    assert_eq!(target_from_url("ws://localhost:8083/ws/realtime/", DEFAULT_PATH_PREFIX), None);
    assert_eq!(target_from_url("not a url", DEFAULT_PATH_PREFIX), None);
}

#[test]
fn test_built_endpoint_round_trips_target() {
    let builder = EndpointBuilder::new(origin("http://localhost:5173"), Environment::Development);
    let endpoint = builder.build(target(99)).unwrap();
    assert_eq!(
        target_from_url(&endpoint.url, DEFAULT_PATH_PREFIX),
        Some(endpoint.target)
    );
}
