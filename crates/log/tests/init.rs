//! Subscriber installation. Kept in one test: the global subscriber can only
//! be set once per process.

use keycycle_log::{Config, Fields, LogError, init_with};

#[test]
fn install_once_then_refuse() {
    // GIVEN: unparseable directives
    let bad = Config {
        level: "keycycle_core=shouting".to_string(),
        ..Config::default()
    };

    // THEN: rejected before anything is installed
    assert!(matches!(init_with(bad), Err(LogError::Filter { .. })));

    // WHEN: a valid config with global fields is installed
    let fields = Fields {
        service: Some("keycycle".into()),
        region: Some("us-east-1".into()),
        ..Fields::default()
    };
    let guard = init_with(Config::production().with_fields(fields)).unwrap();
    assert!(!guard.root_span().is_none());
    tracing::info!(account = "111122223333", "installed");

    // THEN: a second install is refused
    assert!(matches!(init_with(Config::default()), Err(LogError::Init(_))));
}
