use sqltype::{DialectKind, Error, InMemorySchema};

fn person_schema() -> InMemorySchema {
    InMemorySchema::from_ddl(DialectKind::Sqlite, "create table person (id integer primary key, name text not null)").unwrap()
}

#[test]
fn between_over_matching_types_is_accepted() {
    let schema = person_schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select * from person where id between 0 and 999").unwrap();
}

#[test]
fn between_rejects_conflicting_bound_types() {
    let schema = person_schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select * from person where id between 'a' and 'f'").unwrap_err();
    assert!(matches!(err.error, Error::TypeMismatch { .. }));
}
