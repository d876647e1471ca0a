//! Shared fixtures for integration tests
//!
//! - `Person`: guid-keyed audited record with history
//! - `Tag`: integer identity record without audit metadata

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use rowkeeper::{
    ActiveState, AuditMetadata, CancelSignal, EntityService, IdentityMode, InMemoryStore,
    Repository, StorageEngine, TableConfig,
};

pub const PERSON_TABLE: &str = "dbo.[Person]";
pub const PERSON_HISTORY: &str = "dbo.[PersonHist]";
pub const TAG_TABLE: &str = "dbo.[Tag]";
pub const TAG_HISTORY: &str = "dbo.[TagHist]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub audit: AuditMetadata,
}

rowkeeper::impl_record!(Person, "PersonDTO", {
    "id" => id,
    "name" => name,
    "email" => email,
    "active" => audit.active,
    "hostAddress" => audit.host_address,
    "date" => audit.timestamp,
    "userHost" => audit.acting_user,
}, audit = audit);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    pub active: ActiveState,
}

rowkeeper::impl_record!(Tag, "Tag", {
    "id" => id,
    "label" => label,
    "active" => active,
});

/// 2024-05-01 12:30:15.120 UTC
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap() + Duration::milliseconds(120)
}

pub fn person(name: &str) -> Person {
    Person {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: None,
        audit: AuditMetadata {
            timestamp: base_time(),
            ..Default::default()
        },
    }
}

pub fn tag(label: &str) -> Tag {
    Tag {
        id: 0,
        label: label.to_string(),
        active: ActiveState::Active,
    }
}

pub fn person_config() -> TableConfig {
    TableConfig::with_identity_mode(IdentityMode::GuidKeyed)
}

pub fn tag_config() -> TableConfig {
    TableConfig {
        order_by: "id asc".to_string(),
        ..TableConfig::with_identity_mode(IdentityMode::IntegerIdentity)
    }
}

pub fn repository<R: rowkeeper::Record>(store: &Arc<InMemoryStore>, config: TableConfig) -> Repository<R> {
    Repository::new(StorageEngine::new(store.clone()), config).unwrap()
}

pub struct Fixture<R: rowkeeper::Record> {
    pub store: Arc<InMemoryStore>,
    pub service: EntityService<R>,
}

impl<R: rowkeeper::Record> Fixture<R> {
    pub fn rows(&self, table: &str) -> usize {
        self.store.row_count(table).unwrap()
    }
}

pub fn people_on(store: InMemoryStore) -> Fixture<Person> {
    let store = Arc::new(store);
    let service = EntityService::new(repository(&store, person_config()));
    Fixture { store, service }
}

pub fn people() -> Fixture<Person> {
    people_on(InMemoryStore::new())
}

pub fn people_with_signal(signal: CancelSignal) -> Fixture<Person> {
    let store = Arc::new(InMemoryStore::new());
    let service = EntityService::new(repository(&store, person_config()).with_signal(signal));
    Fixture { store, service }
}

pub fn tags() -> Fixture<Tag> {
    let store = Arc::new(InMemoryStore::new());
    let service = EntityService::new(repository(&store, tag_config()));
    Fixture { store, service }
}
