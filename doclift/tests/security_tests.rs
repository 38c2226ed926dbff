//! Security tests for credential protection and data sanitization
//!
//! These tests verify that database credentials are never exposed in outputs,
//! logs, or error messages.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

mod credential_security {
    use doclift_core::{ConnectionConfig, MongoSource, PgTarget, redact_database_url};

    const SENSITIVE_PASSWORD: &str = "super_secret_password_123";
    const SENSITIVE_USERNAME: &str = "admin_user";

    #[test]
    fn test_mongodb_url_redaction() {
        let url = format!(
            "mongodb://{}:{}@db.example.com:27017/appdata",
            SENSITIVE_USERNAME, SENSITIVE_PASSWORD
        );

        let redacted = redact_database_url(&url);

        assert!(
            !redacted.contains(SENSITIVE_PASSWORD),
            "Password leaked in redacted URL: {}",
            redacted
        );
        assert!(
            !redacted.contains(SENSITIVE_USERNAME),
            "Username leaked in redacted URL: {}",
            redacted
        );
        assert!(redacted.contains("db.example.com"));
        assert!(redacted.contains("appdata"));
    }

    #[test]
    fn test_postgres_url_redaction() {
        let url = format!(
            "postgresql://{}:{}@db.example.com:5432/warehouse",
            SENSITIVE_USERNAME, SENSITIVE_PASSWORD
        );

        let redacted = redact_database_url(&url);

        assert!(!redacted.contains(SENSITIVE_PASSWORD));
        assert!(!redacted.contains(SENSITIVE_USERNAME));
        assert!(redacted.contains("warehouse"));
    }

    #[test]
    fn test_mongodb_invalid_url_error_no_credentials() {
        let connection_string = format!(
            "ftp://{}:{}@db.example.com:27017/appdata",
            SENSITIVE_USERNAME, SENSITIVE_PASSWORD
        );

        let result = MongoSource::validate_connection_string(&connection_string);
        assert!(result.is_err());

        if let Err(error) = result {
            let error_msg = format!("{:?}", error);
            assert!(
                !error_msg.contains(SENSITIVE_PASSWORD),
                "Password leaked in error message: {}",
                error_msg
            );
            assert!(
                !error_msg.contains(SENSITIVE_USERNAME),
                "Username leaked in error message: {}",
                error_msg
            );
        }
    }

    #[test]
    fn test_postgres_invalid_url_error_no_credentials() {
        let connection_string = format!(
            "mysql://{}:{}@db.example.com:5432/warehouse",
            SENSITIVE_USERNAME, SENSITIVE_PASSWORD
        );

        let result = PgTarget::validate_connection_string(&connection_string);
        assert!(result.is_err());

        if let Err(error) = result {
            let error_msg = format!("{:?}", error);
            assert!(!error_msg.contains(SENSITIVE_PASSWORD));
            assert!(!error_msg.contains(SENSITIVE_USERNAME));
        }
    }

    #[test]
    fn test_parsed_config_never_stores_password() {
        let connection_string = format!(
            "mongodb://{}:{}@db.example.com:27017/appdata",
            SENSITIVE_USERNAME, SENSITIVE_PASSWORD
        );

        let config = MongoSource::parse_connection_config(&connection_string)
            .expect("Failed to parse connection config");

        let debug = format!("{:?}", config);
        assert!(
            !debug.contains(SENSITIVE_PASSWORD),
            "Password leaked through config Debug: {}",
            debug
        );
    }

    #[test]
    fn test_config_display_omits_username() {
        let config = ConnectionConfig::new("db.example.com".to_string())
            .with_port(5432)
            .with_database("warehouse".to_string())
            .with_username(SENSITIVE_USERNAME.to_string());

        let display = format!("{}", config);
        assert!(
            !display.contains(SENSITIVE_USERNAME),
            "Username leaked through Display: {}",
            display
        );
        assert!(display.contains("db.example.com"));
    }
}

mod checkpoint_security {
    use doclift_core::MigrationState;
    use mongodb::bson::Bson;

    #[test]
    fn test_checkpoint_holds_no_connection_details() {
        let mut state = MigrationState::new("users", "public.users");
        state.record_batch(&Bson::Int64(42), 10, 10, 0);

        let json = serde_json::to_string(&state).expect("Failed to serialize state");

        assert!(!json.contains("mongodb://"));
        assert!(!json.contains("postgres://"));
        assert!(!json.contains("password"));
    }
}
