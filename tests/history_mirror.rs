//! History Mirror Tests
//!
//! Every mutation of a history-keeping table appends one history row holding
//! the record's full field set:
//! - guid-keyed tables key each history row with a fresh uuid
//! - integer identity tables reuse the record id, generated on create
//! - history rows are readable by history id, record id and value

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use common::*;
use rowkeeper::compose::{BindStyle, RecordShape, StatementComposer};
use rowkeeper::repository::field_values;
use rowkeeper::{
    ActiveState, ActorStamp, Actor, EngineError, EntityService, ErrorKind, IdentityMode,
    InMemoryStore, Record, SqlValue, TableConfig,
};

fn history_ids(fixture: &Fixture<Person>) -> Vec<SqlValue> {
    fixture
        .store
        .rows(PERSON_HISTORY)
        .unwrap()
        .iter()
        .map(|r| r.get("IdHist").cloned().unwrap())
        .collect()
}

// =============================================================================
// Guid-keyed history
// =============================================================================

/// Create, update, soft delete and hard delete each add one history row
/// under its own history id.
#[test]
fn test_each_mutation_gets_distinct_history_id() {
    let fixture = people();
    let ann = fixture.service.create(person("Ann")).unwrap().into_inner().unwrap();

    let mut renamed = ann.clone();
    renamed.name = "Ann Lee".to_string();
    let renamed = fixture.service.update(renamed).unwrap().into_inner().unwrap();
    let deleted = fixture.service.soft_delete(renamed).unwrap().into_inner().unwrap();
    fixture.service.hard_delete(deleted).unwrap();

    let ids = history_ids(&fixture);
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| matches!(id, SqlValue::Uuid(_))));
    assert!(ids.iter().all(|id| *id != SqlValue::Uuid(ann.id)));

    let distinct: HashSet<String> = ids.iter().map(SqlValue::to_plain_string).collect();
    assert_eq!(distinct.len(), 4);
}

/// History rows carry the history id plus every record field.
#[test]
fn test_history_row_columns() {
    let fixture = people();
    fixture.service.create(person("Ann")).unwrap();

    let rows = fixture.store.rows(PERSON_HISTORY).unwrap();
    let columns: Vec<&str> = rows[0].iter().map(|(name, _)| name).collect();

    let mut expected = vec!["IdHist"];
    expected.extend(Person::field_names());
    assert_eq!(columns, expected);
}

/// Update columns plus keys are exactly the mirrored fields.
#[test]
fn test_history_fields_cover_update_and_keys() {
    let config = person_config();
    let shape = RecordShape::of::<Person>();
    let composer = StatementComposer::new(&config, &shape, BindStyle::Parameters);
    let values = field_values(&person("Ann"));

    let update = composer.update::<&str>(&values, &[], false).unwrap();
    let history = composer.history_mirror().mirror(&values, false).unwrap().unwrap();

    let mut covered: Vec<String> = update.columns.clone();
    covered.push(config.id_field.clone());
    covered.sort();

    let mut mirrored: Vec<String> = history
        .columns
        .iter()
        .filter(|c| **c != config.history_id_field)
        .cloned()
        .collect();
    mirrored.sort();

    assert_eq!(covered, mirrored);
}

/// The soft-delete history row records the inactive state and the actor.
#[test]
fn test_soft_delete_history_row_is_inactive() {
    let store = Arc::new(InMemoryStore::new());
    let actor = Actor::new(Uuid::new_v4(), "192.168.0.7");
    let service = EntityService::new(repository::<Person>(&store, person_config()))
        .with_hooks(ActorStamp::new(actor.clone()));

    let ann = service.create(person("Ann")).unwrap().into_inner().unwrap();
    service.soft_delete(ann.clone()).unwrap();

    let history = service.history(SqlValue::Uuid(ann.id), true).unwrap();
    assert_eq!(history.len(), 2);
    let states: HashSet<ActiveState> = history.iter().map(|p| p.audit.active).collect();
    assert_eq!(
        states,
        HashSet::from([ActiveState::Active, ActiveState::Inactive])
    );
    assert!(history.iter().all(|p| p.audit.acting_user == actor.user_id));

    let active_only = service.history(SqlValue::Uuid(ann.id), false).unwrap();
    assert_eq!(active_only.len(), 1);
    assert_eq!(active_only[0].audit.active, ActiveState::Active);
}

/// A history row is addressable by its history id.
#[test]
fn test_history_entry_by_history_id() {
    let fixture = people();
    let ann = fixture.service.create(person("Ann")).unwrap().into_inner().unwrap();
    let history_id = history_ids(&fixture).remove(0);

    let entry = fixture.service.history_entry(history_id, true).unwrap();
    assert_eq!(entry, ann);

    let missing = Uuid::new_v4();
    assert_eq!(
        fixture
            .service
            .history_entry(SqlValue::Uuid(missing), true)
            .unwrap_err(),
        EngineError::NotFound {
            key: format!("IdHist={}", missing)
        }
    );
}

/// History reads by field value span every record.
#[test]
fn test_history_by_value() {
    let fixture = people();
    let ann = fixture.service.create(person("Ann")).unwrap().into_inner().unwrap();
    fixture.service.create(person("Bea")).unwrap();

    let mut renamed = ann.clone();
    renamed.name = "Ann".to_string();
    renamed.email = Some("ann@example.com".to_string());
    fixture.service.update(renamed).unwrap();

    let rows = fixture
        .service
        .history_where("name", SqlValue::from("ANN"), true)
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|p| p.id == ann.id));

    let rows = fixture
        .service
        .history_by_values(&[SqlValue::from("Bea")], &["name"], false)
        .unwrap();
    assert_eq!(rows.len(), 1);

    assert_eq!(
        fixture
            .service
            .history_where("name", SqlValue::from("Cy"), false)
            .unwrap_err(),
        EngineError::NoContent
    );
}

// =============================================================================
// Integer identity history
// =============================================================================

/// The history row of a create carries the generated id.
#[test]
fn test_integer_identity_history_inherits_generated_id() {
    let fixture = tags();
    fixture.service.create(tag("rust")).unwrap();
    fixture.service.create(tag("sql")).unwrap();

    let rows = fixture.store.rows(TAG_HISTORY).unwrap();
    let ids: Vec<&SqlValue> = rows.iter().map(|r| r.get("id").unwrap()).collect();
    assert_eq!(ids, vec![&SqlValue::Int(1), &SqlValue::Int(2)]);
    assert!(rows.iter().all(|r| r.get("IdHist").is_none()));

    let history = fixture.service.history(SqlValue::Int(2), true).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].label, "sql");
}

/// Later mutations mirror the id the caller holds.
#[test]
fn test_integer_identity_update_history() {
    let fixture = tags();
    fixture.service.create(tag("rust")).unwrap();

    let mut stored = fixture.service.get(SqlValue::Int(1), false).unwrap();
    stored.label = "rustlang".to_string();
    fixture.service.update(stored).unwrap();

    let labels: Vec<String> = fixture
        .service
        .history(SqlValue::Int(1), true)
        .unwrap()
        .into_iter()
        .map(|t| t.label)
        .collect();
    assert_eq!(labels, vec!["rust", "rustlang"]);
}

// =============================================================================
// No history
// =============================================================================

/// Tables without history write only the primary row.
#[test]
fn test_no_history_mode() {
    let store = Arc::new(InMemoryStore::new());
    let config = TableConfig::with_identity_mode(IdentityMode::NoHistory);
    let service = EntityService::new(repository::<Person>(&store, config));

    let ann = service.create(person("Ann")).unwrap().into_inner().unwrap();
    service.hard_delete(ann.clone()).unwrap();

    assert_eq!(store.row_count(PERSON_HISTORY).unwrap(), 0);
    assert_eq!(
        service.history(SqlValue::Uuid(ann.id), true).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
