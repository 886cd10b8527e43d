use dev_test_runner::{client, server, server_internal};
use proptest::prelude::*;

#[test]
fn build_validates_the_raw_values_in_declaration_order() {
    use server_internal::model::{Record, id, record, title};

    let missing_id = Record::builder().title("far too long".to_string()).build();
    assert_eq!(missing_id, Err(record::ConstraintViolation::MissingId));

    let bad_id_and_title = Record::builder()
        .id("ABC".to_string())
        .title("far too long".to_string())
        .build();
    assert_eq!(
        bad_id_and_title,
        Err(record::ConstraintViolation::Id(id::ConstraintViolation::Pattern("ABC".to_string())))
    );

    let bad_title_and_priority = Record::builder()
        .id("abc".to_string())
        .title("far too long".to_string())
        .priority(99)
        .build();
    assert_eq!(
        bad_title_and_priority,
        Err(record::ConstraintViolation::Title(title::ConstraintViolation::Length(12)))
    );
}

#[test]
fn build_is_repeatable() {
    use server_internal::model::Record;

    let builder = Record::builder().id("abc".to_string()).tags(vec!["x".to_string()]);
    assert_eq!(builder.clone().build(), builder.clone().build());

    let failing = Record::builder().id("abc".to_string()).priority(0);
    let first = failing.clone().build().unwrap_err();
    let second = failing.build().unwrap_err();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn defaults_fill_unset_members() {
    let record = server::model::Record::builder()
        .id(server::model::Id::try_from("abc").unwrap())
        .build()
        .unwrap();
    assert_eq!(record.status, server::model::Status::Active);
    assert_eq!(record.tags, None);

    let record = client::model::Record::builder().id("abc".to_string()).build().unwrap();
    assert_eq!(record.status, client::model::Status::Active);
}

#[test]
fn length_counts_unicode_scalar_values() {
    use server_internal::model::{Record, record, title};

    let accented = Record::builder().id("abc".to_string()).title("héllo".to_string()).build().unwrap();
    assert_eq!(accented.title.as_deref(), Some("héllo"));

    let wide = Record::builder().id("abc".to_string()).title("日本語日本語".to_string()).build();
    assert_eq!(wide, Err(record::ConstraintViolation::Title(title::ConstraintViolation::Length(6))));

    assert!(server::model::Title::try_from("🦀🦀🦀🦀🦀").is_ok());
    assert!(server::model::Title::try_from("").is_err());
}

#[test]
fn public_newtypes_validate_on_construction() {
    use server::model::{Id, Priority, Status, id, priority};

    assert_eq!(Id::try_from("abc").unwrap().as_str(), "abc");
    assert_eq!(Id::try_from("ABC"), Err(id::ConstraintViolation::Pattern("ABC".to_string())));
    assert_eq!(Priority::try_from(3).map(|value| *value.inner()), Ok(3));
    assert!(matches!(Priority::try_from(6), Err(priority::ConstraintViolation::Range(6))));
    assert_eq!(Status::try_from("archived"), Ok(Status::Archived));
    assert_eq!(Status::try_from("deleted").unwrap_err().value(), "deleted");
}

#[test]
fn violations_name_the_member() {
    use server_internal::model::Record;

    let error = Record::builder().id("ABC".to_string()).build().unwrap_err();
    let message = error.to_string();
    assert!(message.starts_with("`id`:"), "{message}");
    assert!(message.contains("ABC"), "{message}");

    let missing = Record::builder().build().unwrap_err().to_string();
    assert!(missing.contains("`id` was not provided"), "{missing}");
}

#[test]
fn client_builders_only_check_required_members() {
    use client::model::{Record, record};

    assert_eq!(Record::builder().build(), Err(record::ConstraintViolation::MissingId));
    let record = Record::builder()
        .id("NOT-VALIDATED".to_string())
        .title("far too long".to_string())
        .priority(99)
        .build()
        .unwrap();
    assert_eq!(record.priority, Some(99));
}

proptest! {
    #[test]
    fn titles_accept_one_to_five_characters(title in "\\PC{0,8}") {
        let count = title.chars().count();
        let built = server::model::Title::try_from(title.as_str());
        prop_assert_eq!(built.is_ok(), (1..=5).contains(&count));
    }
}
