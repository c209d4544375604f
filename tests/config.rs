// ABOUTME: Integration tests for configuration parsing and discovery.
// ABOUTME: Tests YAML parsing, env references, overrides, and init scaffolding.

use catapult::config::*;
use catapult::error::Error;
use catapult::ledger::ConcurrencyMode;
use std::time::Duration;

fn no_overrides() -> EnvOverrides {
    EnvOverrides::default()
}

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = LedgerConfig::from_yaml("release_bucket: rel\n", &no_overrides()).unwrap();
        assert_eq!(config.release_bucket, "rel");
        assert!(config.deploy_bucket.is_none());
        assert!(config.environments.is_empty());
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.git, GitConfig::default());
        assert_eq!(config.git.remote.as_deref(), Some("origin"));
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
release_bucket: acme-releases
deploy_bucket: acme-deploys
aws_profile: acme
mfa_device: arn:aws:iam::123456789012:mfa/dev
endpoint: http://localhost:9000
environments:
  - staging
  - production
concurrency: accept-race
max_write_attempts: 8
retry:
  max_attempts: 5
  base_delay: 50ms
  timeout: 10s
git:
  remote: upstream
  tag: false
  timeout: 15s
"#;
        let config = LedgerConfig::from_yaml(yaml, &no_overrides()).unwrap();
        assert_eq!(config.deploy_bucket().unwrap(), "acme-deploys");
        assert_eq!(config.aws_profile.as_deref(), Some("acme"));
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        let envs: Vec<&str> = config.environments.iter().map(|e| e.as_str()).collect();
        assert_eq!(envs, vec!["staging", "production"]);
        assert_eq!(config.concurrency, ConcurrencyMode::AcceptRace);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.retry.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_delay, Duration::from_secs(2));
        assert_eq!(config.git.remote.as_deref(), Some("upstream"));
        assert!(!config.git.tag);
        assert_eq!(config.git.timeout, Duration::from_secs(15));
        assert_eq!(config.max_write_attempts, 8);

        let options = config.release_options();
        assert_eq!(options.concurrency, ConcurrencyMode::AcceptRace);
        assert_eq!(options.max_write_attempts, 8);
        assert!(!options.create_tags);
    }

    #[test]
    fn write_attempts_and_git_timeout_have_defaults() {
        let config = LedgerConfig::from_yaml("release_bucket: rel
", &no_overrides()).unwrap();
        assert_eq!(config.max_write_attempts, 5);
        assert_eq!(config.release_options().max_write_attempts, 5);
        assert_eq!(config.git.timeout, Duration::from_secs(60));

        let dir = tempfile::tempdir().unwrap();
        let overrides = EnvOverrides {
            release_bucket: Some("env-rel".to_string()),
            ..EnvOverrides::default()
        };
        let config = LedgerConfig::discover(dir.path(), &overrides).unwrap();
        assert_eq!(config.max_write_attempts, 5);
    }

    #[test]
    fn null_remote_keeps_tags_local() {
        let yaml = "release_bucket: rel\ngit:\n  remote: null\n";
        let config = LedgerConfig::from_yaml(yaml, &no_overrides()).unwrap();
        assert!(config.git.remote.is_none());
        assert!(config.git.tag);
    }

    #[test]
    fn missing_release_bucket_is_required() {
        let err = LedgerConfig::from_yaml("deploy_bucket: dep\n", &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredParameter("release_bucket")));
    }

    #[test]
    fn empty_release_bucket_counts_as_missing() {
        let err = LedgerConfig::from_yaml("release_bucket: ''\n", &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredParameter("release_bucket")));
    }

    #[test]
    fn missing_deploy_bucket_fails_on_access() {
        let config = LedgerConfig::from_yaml("release_bucket: rel\n", &no_overrides()).unwrap();
        let err = config.deploy_bucket().unwrap_err();
        assert!(matches!(err, Error::MissingRequiredParameter("deploy_bucket")));
        assert!(err.to_string().contains("deploy_bucket"));
    }

    #[test]
    fn invalid_environment_name_is_rejected() {
        let yaml = "release_bucket: rel\nenvironments:\n  - ''\n";
        assert!(LedgerConfig::from_yaml(yaml, &no_overrides()).is_err());
    }

    #[test]
    fn unknown_concurrency_mode_is_rejected() {
        let yaml = "release_bucket: rel\nconcurrency: yolo\n";
        assert!(matches!(
            LedgerConfig::from_yaml(yaml, &no_overrides()),
            Err(Error::Yaml(_))
        ));
    }
}

mod env_values {
    use super::*;

    #[test]
    fn literal_value() {
        let value: EnvValue = serde_yaml::from_str("plain").unwrap();
        assert_eq!(value, EnvValue::Literal("plain".to_string()));
        assert_eq!(value.resolve().unwrap(), "plain");
    }

    #[test]
    fn env_reference() {
        let value: EnvValue = serde_yaml::from_str("env: CATAPULT_TEST_BUCKET").unwrap();
        temp_env::with_var("CATAPULT_TEST_BUCKET", Some("from-env"), || {
            assert_eq!(value.resolve().unwrap(), "from-env");
        });
    }

    #[test]
    fn env_reference_with_default() {
        let value: EnvValue =
            serde_yaml::from_str("{env: CATAPULT_TEST_UNSET, default: fallback}").unwrap();
        temp_env::with_var_unset("CATAPULT_TEST_UNSET", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn unset_env_reference_without_default_fails() {
        let yaml = "release_bucket:\n  env: CATAPULT_TEST_MISSING\n";
        temp_env::with_var_unset("CATAPULT_TEST_MISSING", || {
            let err = LedgerConfig::from_yaml(yaml, &no_overrides()).unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(var) if var == "CATAPULT_TEST_MISSING"));
        });
    }

    #[test]
    fn resolve_optional_treats_empty_as_unset() {
        let empty = EnvValue::Literal(String::new());
        assert_eq!(resolve_optional(Some(&empty)).unwrap(), None);
        assert_eq!(resolve_optional(None).unwrap(), None);
    }
}

mod overrides {
    use super::*;

    #[test]
    fn overrides_win_over_file() {
        let overrides = EnvOverrides {
            release_bucket: Some("override-rel".to_string()),
            aws_profile: Some("ci".to_string()),
            ..EnvOverrides::default()
        };
        let yaml = "release_bucket: file-rel\ndeploy_bucket: file-dep\naws_profile: dev\n";
        let config = LedgerConfig::from_yaml(yaml, &overrides).unwrap();
        assert_eq!(config.release_bucket, "override-rel");
        assert_eq!(config.deploy_bucket.as_deref(), Some("file-dep"));
        assert_eq!(config.aws_profile.as_deref(), Some("ci"));
    }

    #[test]
    fn from_env_reads_prefixed_variables() {
        temp_env::with_vars(
            [
                (ENV_RELEASE_BUCKET, Some("env-rel")),
                (ENV_DEPLOY_BUCKET, Some("")),
                (ENV_AWS_PROFILE, None),
                (ENV_MFA_DEVICE, Some("arn:mfa")),
            ],
            || {
                let overrides = EnvOverrides::from_env();
                assert_eq!(overrides.release_bucket.as_deref(), Some("env-rel"));
                assert_eq!(overrides.deploy_bucket, None);
                assert_eq!(overrides.aws_profile, None);
                assert_eq!(overrides.mfa_device.as_deref(), Some("arn:mfa"));
            },
        );
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_config_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILENAME), "release_bucket: rel\n").unwrap();
        let nested = root.path().join("services/api");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config(&nested).unwrap();
        assert_eq!(found, root.path().join(CONFIG_FILENAME));

        let config = LedgerConfig::discover(&nested, &no_overrides()).unwrap();
        assert_eq!(config.release_bucket, "rel");
        assert_eq!(config.path.as_deref(), Some(found.as_path()));
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join(".catapult")).unwrap();
        std::fs::write(root.path().join(CONFIG_FILENAME_DIR), "release_bucket: rel\n").unwrap();

        assert_eq!(
            find_config(root.path()),
            Some(root.path().join(CONFIG_FILENAME_DIR))
        );
    }

    #[test]
    fn nearest_config_wins() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILENAME), "release_bucket: outer\n").unwrap();
        let inner = root.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(inner.join(CONFIG_FILENAME_ALT), "release_bucket: inner\n").unwrap();

        let config = LedgerConfig::discover(&inner, &no_overrides()).unwrap();
        assert_eq!(config.release_bucket, "inner");
    }

    #[test]
    fn without_file_uses_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = EnvOverrides {
            release_bucket: Some("env-rel".to_string()),
            ..EnvOverrides::default()
        };
        let config = LedgerConfig::discover(dir.path(), &overrides).unwrap();
        assert_eq!(config.release_bucket, "env-rel");
        assert!(config.path.is_none());
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerConfig::load(&dir.path().join("nope.yml"), &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }
}

mod init {
    use super::*;

    #[test]
    fn writes_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("acme-rel"), Some("acme-dep"), false).unwrap();

        let config =
            LedgerConfig::load(&dir.path().join(CONFIG_FILENAME), &no_overrides()).unwrap();
        assert_eq!(config.release_bucket, "acme-rel");
        assert_eq!(config.deploy_bucket().unwrap(), "acme-dep");
        assert_eq!(config.environments.len(), 2);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, None, false).unwrap();

        let err = init_config(dir.path(), None, None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        init_config(dir.path(), Some("again"), None, true).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(content.contains("release_bucket: again"));
    }
}
