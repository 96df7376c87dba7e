//! Inventory scans against an in-memory account.

use chrono::{DateTime, TimeZone, Utc};
use keycycle_aws::IamAccountScanner;
use keycycle_core::testing::{Call, FakeAccount};
use keycycle_core::{AccountScanner, KeyMetadata, KeyStatus};
use pretty_assertions::assert_eq;

const GROUP: &str = "key-rotation-exempt";

fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn key(user: &str, id: &str) -> KeyMetadata {
    KeyMetadata::new(user, id, KeyStatus::Active, created())
}

fn ids(keys: &[KeyMetadata]) -> Vec<&str> {
    keys.iter().map(|k| k.access_key_id.as_str()).collect()
}

#[tokio::test]
async fn exempt_members_are_skipped() {
    // GIVEN three users, one of them in the exemption group
    let account = FakeAccount::new("111122223333", "us-east-1")
        .with_key(key("alice", "AKIAALICE1"))
        .with_key(key("bob", "AKIABOB1"))
        .with_key(key("alice", "AKIAALICE2"))
        .with_key(key("carol", "AKIACAROL1"))
        .with_group_member(GROUP, "bob");

    // WHEN scanning
    let keys = IamAccountScanner::new(GROUP)
        .scan(account.session().as_ref())
        .await
        .unwrap();

    // THEN bob's keys are absent and the rest come back user by user
    assert_eq!(ids(&keys), vec!["AKIAALICE1", "AKIAALICE2", "AKIACAROL1"]);
    assert!(!account.calls().contains(&Call::ListAccessKeys { user: "bob".into() }));
}

#[tokio::test]
async fn missing_group_exempts_nobody() {
    let account = FakeAccount::new("111122223333", "us-east-1")
        .with_key(key("alice", "AKIAALICE1"))
        .with_key(key("bob", "AKIABOB1"));

    let keys = IamAccountScanner::new(GROUP)
        .scan(account.session().as_ref())
        .await
        .unwrap();

    assert_eq!(ids(&keys), vec!["AKIAALICE1", "AKIABOB1"]);
}

#[tokio::test]
async fn users_without_keys_are_listed_but_contribute_nothing() {
    let account = FakeAccount::new("111122223333", "us-east-1")
        .with_user("svc-build")
        .with_key(key("alice", "AKIAALICE1"));

    let keys = IamAccountScanner::new(GROUP)
        .scan(account.session().as_ref())
        .await
        .unwrap();

    assert_eq!(ids(&keys), vec!["AKIAALICE1"]);
    assert!(account.calls().contains(&Call::ListAccessKeys {
        user: "svc-build".into()
    }));
}

#[tokio::test]
async fn group_lookup_failure_aborts_the_scan() {
    // GIVEN the exemption group cannot be read for a reason other than absence
    let account = FakeAccount::new("111122223333", "us-east-1")
        .with_key(key("alice", "AKIAALICE1"))
        .failing("GetGroup");

    // WHEN scanning
    let result = IamAccountScanner::new(GROUP)
        .scan(account.session().as_ref())
        .await;

    // THEN nobody's keys are listed, since exemptions are unknown
    assert!(result.is_err());
    assert_eq!(account.operations(), vec!["GetGroup"]);
}

#[tokio::test]
async fn key_listing_failure_is_propagated() {
    let account = FakeAccount::new("111122223333", "us-east-1")
        .with_key(key("alice", "AKIAALICE1"))
        .with_key(key("bob", "AKIABOB1"))
        .failing_for_user("ListAccessKeys", "bob");

    let result = IamAccountScanner::new(GROUP)
        .scan(account.session().as_ref())
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("ListAccessKeys"));
}
