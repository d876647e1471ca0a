//! Query Shape Tests
//!
//! Composed predicates evaluated end to end:
//! - value groups are OR-joined, fields within a group AND-joined
//! - combine mode matches a composite key in any rotated order
//! - case-insensitive, list, pattern and null matchers
//! - malformed arguments fail before reaching the store

mod common;

use std::sync::Arc;

use chrono::Duration;

use common::*;
use rowkeeper::compose::predicate::query_parameters;
use rowkeeper::compose::{BindStyle, RecordShape, StatementComposer};
use rowkeeper::{EngineError, EntityService, ErrorKind, InMemoryStore, SqlValue};

struct Seeded {
    fixture: Fixture<Person>,
    ann: Person,
    bea: Person,
    cy: Person,
}

fn seeded() -> Seeded {
    let fixture = people();
    let make = |name: &str, email: Option<&str>, hours: i64| {
        let mut p = person(name);
        p.email = email.map(str::to_string);
        p.audit.timestamp = base_time() + Duration::hours(hours);
        fixture.service.create(p).unwrap().into_inner().unwrap()
    };
    let ann = make("Ann", Some("ann@example.com"), 0);
    let bea = make("Bea", None, 1);
    let cy = make("Cy", Some("cy@example.org"), 2);
    Seeded { fixture, ann, bea, cy }
}

fn names(records: Vec<Person>) -> Vec<String> {
    records.into_iter().map(|p| p.name).collect()
}

// =============================================================================
// Statement text
// =============================================================================

/// Inline literals render each value group as its own conjunction.
#[test]
fn test_inline_group_rendering() {
    let config = person_config();
    let shape = RecordShape::of::<Person>();
    let composer = StatementComposer::new(&config, &shape, BindStyle::InlineLiterals);

    let mut binder = composer.binder();
    let values = ["a", "b", "c", "d"].map(SqlValue::from);
    let predicate = query_parameters(&values, &["name", "email"], false, &mut binder).unwrap();
    let statement = composer.count(Some(binder.finish(predicate)), false).unwrap();

    assert_eq!(
        statement.sql(),
        "select count(1) from dbo.[Person] where active = 1 and \
         ((name = 'a' and email = 'b') or (name = 'c' and email = 'd'))"
    );
    assert!(statement.params().is_empty());
}

/// Bound parameters keep caller text out of the statement.
#[test]
fn test_parameter_rendering() {
    let config = person_config();
    let shape = RecordShape::of::<Person>();
    let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);

    let mut binder = composer.binder();
    let values = [SqlValue::from("x' or '1'='1")];
    let predicate = query_parameters(&values, &["name"], false, &mut binder).unwrap();
    let statement = composer.select(Some(binder.finish(predicate)), true).unwrap();

    assert_eq!(
        statement.sql(),
        "select [id],[name],[email],[active],[hostAddress],[date],[userHost] \
         from dbo.[Person] where (name = @__p0) order by date desc"
    );
    assert_eq!(statement.params().get("__p0"), Some(&values[0]));
}

// =============================================================================
// Value groups
// =============================================================================

/// Several groups of one field match any of the values.
#[test]
fn test_groups_are_alternatives() {
    let s = seeded();
    let found = s
        .fixture
        .service
        .get_by_values(&[SqlValue::from("Ann"), SqlValue::from("Cy")], &["name"], false, false)
        .unwrap();
    assert_eq!(names(found), vec!["Cy", "Ann"]);
}

/// Combine mode finds a composite key given in rotated order.
#[test]
fn test_combine_matches_rotation() {
    let s = seeded();
    let rotated = [SqlValue::from("ann@example.com"), SqlValue::from("Ann")];

    assert_eq!(
        s.fixture
            .service
            .get_by_values(&rotated, &["name", "email"], false, false)
            .unwrap_err(),
        EngineError::NoContent
    );
    let found = s
        .fixture
        .service
        .get_by_values(&rotated, &["name", "email"], true, false)
        .unwrap();
    assert_eq!(found, vec![s.ann.clone()]);
}

/// Exists compares the match count with the expected amount.
#[test]
fn test_exists_amount() {
    let s = seeded();
    let values = [SqlValue::from("Ann"), SqlValue::from("Bea")];

    assert!(s.fixture.service.exists(&values, &["name"], 2, false, false).unwrap());
    assert!(!s.fixture.service.exists(&values, &["name"], 1, false, false).unwrap());
    assert!(!s
        .fixture
        .service
        .exists(&[SqlValue::from("Dee")], &["name"], 1, false, false)
        .unwrap());
}

/// Related lookups AND the id with the groups; existence checks OR them.
#[test]
fn test_related_lookups() {
    let s = seeded();
    let ann_id = SqlValue::Uuid(s.ann.id);

    let found = s
        .fixture
        .service
        .get_related(ann_id.clone(), &[SqlValue::from("Ann")], &["name"], false, false)
        .unwrap();
    assert_eq!(found, vec![s.ann.clone()]);

    assert_eq!(
        s.fixture
            .service
            .get_related(ann_id.clone(), &[SqlValue::from("Bea")], &["name"], false, false)
            .unwrap_err(),
        EngineError::NoContent
    );

    assert!(s
        .fixture
        .service
        .exists_related(ann_id, &[SqlValue::from("Bea")], &["name"], 2, false, false)
        .unwrap());
}

/// Single-field existence counts rows equal to the value.
#[test]
fn test_exists_by_field() {
    let s = seeded();
    let service = &s.fixture.service;

    assert!(service.exists_by("email", SqlValue::from("cy@example.org"), 1, false).unwrap());
    assert!(service.exists_by("name", SqlValue::from("Dee"), 0, false).unwrap());

    service.soft_delete(s.cy.clone()).unwrap();
    assert!(service.exists_by("name", SqlValue::from("Cy"), 0, false).unwrap());
    assert!(service.exists_by("name", SqlValue::from("Cy"), 1, true).unwrap());
}

// =============================================================================
// Field matchers
// =============================================================================

#[test]
fn test_case_insensitive_equality() {
    let s = seeded();

    assert_eq!(
        s.fixture
            .service
            .get_where("name", SqlValue::from("ANN"), false, false)
            .unwrap_err(),
        EngineError::NoContent
    );
    let found = s
        .fixture
        .service
        .get_where("name", SqlValue::from("ANN"), true, false)
        .unwrap();
    assert_eq!(found, vec![s.ann.clone()]);
}

#[test]
fn test_list_pattern_and_null_matchers() {
    let s = seeded();
    let service = &s.fixture.service;

    let listed = service
        .get_in(
            "name",
            &[SqlValue::from("ann"), SqlValue::from("bea"), SqlValue::from("ann")],
            true,
            false,
        )
        .unwrap();
    assert_eq!(names(listed), vec!["Bea", "Ann"]);

    assert_eq!(
        names(service.get_not("name", SqlValue::from("Ann"), false, false).unwrap()),
        vec!["Cy", "Bea"]
    );
    assert_eq!(
        names(service.get_like("email", "@example.", false, false).unwrap()),
        vec!["Cy", "Ann"]
    );
    assert_eq!(
        names(service.get_like("email", ".COM", true, false).unwrap()),
        vec!["Ann"]
    );
    assert_eq!(service.get_null("email", false).unwrap(), vec![s.bea.clone()]);
}

/// Lists come back in configured order; `get_first` takes the head.
#[test]
fn test_ordering_and_first() {
    let s = seeded();
    let service = &s.fixture.service;

    assert_eq!(names(service.get_all(false).unwrap()), vec!["Cy", "Bea", "Ann"]);
    assert_eq!(
        service.get_first("active", SqlValue::Int(1), false, false).unwrap(),
        s.cy
    );
    assert_eq!(service.get_at("date", base_time(), false).unwrap(), vec![s.ann.clone()]);

    let many = service
        .get_many(&[SqlValue::Uuid(s.ann.id), SqlValue::Uuid(s.cy.id)], false)
        .unwrap();
    assert_eq!(names(many), vec!["Cy", "Ann"]);
}

/// Inline literals reach the same rows as bound parameters.
#[test]
fn test_inline_style_reads() {
    let store = Arc::new(InMemoryStore::new());
    let writer = EntityService::new(repository::<Person>(&store, person_config()));
    let ann = writer.create(person("Ann")).unwrap().into_inner().unwrap();

    let inline = EntityService::new(
        repository::<Person>(&store, person_config()).with_bind_style(BindStyle::InlineLiterals),
    );
    assert_eq!(inline.get(SqlValue::Uuid(ann.id), false).unwrap(), ann);
    assert_eq!(
        inline
            .get_by_values(&[SqlValue::from("Ann")], &["name"], false, false)
            .unwrap(),
        vec![ann]
    );
}

// =============================================================================
// Malformed arguments
// =============================================================================

#[test]
fn test_malformed_arguments() {
    let s = seeded();
    let service = &s.fixture.service;

    let arity = service
        .get_by_values(
            &[SqlValue::from("a"), SqlValue::from("b"), SqlValue::from("c")],
            &["name", "email"],
            false,
            false,
        )
        .unwrap_err();
    assert_eq!(arity.kind(), ErrorKind::BadParameter);

    for field in ["name; drop table x", "nickname"] {
        assert_eq!(
            service
                .get_where(field, SqlValue::from("x"), false, false)
                .unwrap_err()
                .kind(),
            ErrorKind::BadParameter
        );
    }
    assert_eq!(
        service
            .get_by_values::<&str>(&[SqlValue::from("x")], &[], false, false)
            .unwrap_err()
            .kind(),
        ErrorKind::BadParameter
    );
    assert_eq!(
        service
            .get_where("name", SqlValue::Null, false, false)
            .unwrap_err()
            .kind(),
        ErrorKind::BadParameter
    );
}
