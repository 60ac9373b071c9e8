use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert!(settings.database.url.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(20));
    assert_eq!(settings.cache.max_entries.get(), 200);
    assert_eq!(
        settings.media.max_request_bytes.get(),
        DEFAULT_MEDIA_REQUEST_LIMIT_BYTES
    );
    assert_eq!(settings.auth.user_header.as_str(), "x-authenticated-user");
    assert_eq!(settings.auth.login_url, "/auth/login/");
}

#[test]
fn blank_database_url_selects_in_process_store() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_cache_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.index_ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.index_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn invalid_user_header_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.user_header = Some("not a header".to_string());
    let err = Settings::from_raw(raw).expect_err("bad header");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.user_header",
            ..
        }
    ));
}

#[test]
fn shared_listener_address_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.admin_port = Some(DEFAULT_PUBLIC_PORT);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cli_can_disable_the_cache() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        cache_enabled: Some(false),
        cache_index_ttl_seconds: Some(5),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(5));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quill"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_users_create_arguments() {
    let args = CliArgs::parse_from([
        "quill",
        "users",
        "--database-url",
        "postgres://example",
        "create",
        "leo",
    ]);

    match args.command.expect("users command") {
        Command::Users(users) => {
            assert_eq!(
                users.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert!(matches!(
                users.command,
                UsersCommand::Create { ref username } if username == "leo"
            ));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_groups_create_arguments() {
    let args = CliArgs::parse_from([
        "quill", "groups", "create", "--title", "Cats", "--slug", "cats",
    ]);

    match args.command.expect("groups command") {
        Command::Groups(groups) => match groups.command {
            GroupsCommand::Create {
                title,
                slug,
                description,
            } => {
                assert_eq!(title, "Cats");
                assert_eq!(slug.as_deref(), Some("cats"));
                assert!(description.is_empty());
            }
            GroupsCommand::Delete { .. } => panic!("wrong subcommand parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "quill",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
