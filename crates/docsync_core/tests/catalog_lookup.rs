use docsync_core::db::open_db_in_memory;
use docsync_core::{
    CatalogCache, CatalogError, CatalogRepository, CatalogSeed, DocumentTypeRef, NewSubsection,
    SchemaCatalog, SqliteCatalogRepository,
};
use rusqlite::Connection;

const SEED: &str = r#"
[[document_type]]
name = "business-plan"

[[document_type.section]]
name = "Finance"
order = 2

[[document_type.section.subsection]]
name = "budget"
order = 3

[[document_type.section.subsection]]
name = "revenue"
order = 1

[[document_type.section.subsection]]
name = "costs"
order = 1

[[document_type.section]]
name = "Overview"
order = 0

[[document_type.section.subsection]]
name = "summary"
order = 0
priority = 0

[[document_type.section.subsection]]
name = "mission"
order = 0
priority = 5
content_type = "markdown"

[[document_type]]
name = "grant-application"

[[document_type.section]]
name = "Budget"

[[document_type.section.subsection]]
name = "summary"
"#;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    {
        let catalog = catalog(&conn, CatalogCache::default());
        catalog
            .apply_seed(&CatalogSeed::from_toml_str(SEED).unwrap())
            .unwrap();
    }
    conn
}

fn catalog(conn: &Connection, cache: CatalogCache) -> SchemaCatalog<SqliteCatalogRepository<'_>> {
    SchemaCatalog::new(SqliteCatalogRepository::try_new(conn).unwrap(), cache)
}

fn by_name(name: &str) -> DocumentTypeRef {
    DocumentTypeRef::Name(name.to_string())
}

#[test]
fn sections_and_subsections_come_back_in_non_decreasing_order() {
    let conn = setup();
    let catalog = catalog(&conn, CatalogCache::default());

    let definition = catalog
        .resolve_document_type(&by_name("business-plan"))
        .unwrap();

    let section_names: Vec<_> = definition
        .sections
        .iter()
        .map(|section| section.section.name.as_str())
        .collect();
    assert_eq!(section_names, ["Overview", "Finance"]);

    for section in &definition.sections {
        assert!(section
            .subsections
            .iter()
            .all(|sub| sub.section_id == section.section.id));
        assert!(section
            .subsections
            .windows(2)
            .all(|pair| pair[0].order <= pair[1].order));
    }

    let finance = &definition.sections[1];
    assert_eq!(finance.subsections.len(), 3);
    assert_eq!(finance.subsections[2].name, "budget");
    assert_eq!(definition.subsection_count(), 5);
}

#[test]
fn equal_orders_are_broken_by_id() {
    let conn = setup();
    let catalog = catalog(&conn, CatalogCache::default());

    let definition = catalog
        .resolve_document_type(&by_name("business-plan"))
        .unwrap();
    let overview = &definition.sections[0];
    assert_eq!(overview.subsections[0].order, overview.subsections[1].order);
    assert!(overview.subsections[0].id < overview.subsections[1].id);
}

#[test]
fn resolve_by_id_matches_resolve_by_name() {
    let conn = setup();
    let catalog = catalog(&conn, CatalogCache::default());

    let named = catalog
        .resolve_document_type(&by_name("business-plan"))
        .unwrap();
    let by_id = catalog
        .resolve_document_type(&DocumentTypeRef::Id(named.document_type.id))
        .unwrap();
    assert_eq!(*named, *by_id);

    let listed = catalog.list_sections(named.document_type.id).unwrap();
    assert_eq!(listed, named.sections);
}

#[test]
fn unknown_document_type_is_not_found() {
    let conn = setup();
    let catalog = catalog(&conn, CatalogCache::default());

    let err = catalog
        .resolve_document_type(&by_name("pitch-deck"))
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::DocumentTypeNotFound(DocumentTypeRef::Name(name)) if name == "pitch-deck"
    ));
}

#[test]
fn cached_definition_stays_stale_until_invalidated() {
    let conn = setup();
    let cache = CatalogCache::default();
    let catalog = catalog(&conn, cache.clone());
    let lookup = by_name("grant-application");

    let before = catalog.resolve_document_type(&lookup).unwrap();
    assert_eq!(before.subsection_count(), 1);

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    repo.insert_subsection(&NewSubsection {
        section_id: before.sections[0].section.id,
        name: "timeline".to_string(),
        order: 1,
        priority: 0,
        content_type: "text".to_string(),
    })
    .unwrap();

    let cached = catalog.resolve_document_type(&lookup).unwrap();
    assert_eq!(cached.subsection_count(), 1);

    catalog.invalidate(&lookup);
    let refreshed = catalog.resolve_document_type(&lookup).unwrap();
    assert_eq!(refreshed.subsection_count(), 2);
    assert!(cache.get(&lookup).is_some());
}

#[test]
fn seed_import_skips_existing_types() {
    let conn = setup();
    let catalog = catalog(&conn, CatalogCache::default());

    let report = catalog
        .apply_seed(&CatalogSeed::from_toml_str(SEED).unwrap())
        .unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.skipped, ["business-plan", "grant-application"]);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM document_subsections;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(count, 6);
}

#[test]
fn seed_rejects_duplicate_subsection_names_within_a_type() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn, CatalogCache::default());
    let seed = CatalogSeed::from_toml_str(
        r#"
        [[document_type]]
        name = "report"

        [[document_type.section]]
        name = "Intro"
        [[document_type.section.subsection]]
        name = "notes"

        [[document_type.section]]
        name = "Outro"
        [[document_type.section.subsection]]
        name = "notes"
        "#,
    )
    .unwrap();

    let err = catalog.apply_seed(&seed).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidSeed(message) if message.contains("notes")));

    let types: i64 = conn
        .query_row("SELECT COUNT(*) FROM document_types;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(types, 0);
}

#[test]
fn failed_seed_leaves_no_partial_type_behind() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog(&conn, CatalogCache::default());
    conn.execute_batch(
        "CREATE TRIGGER reject_forecast BEFORE INSERT ON document_subsections
         WHEN NEW.name = 'forecast'
         BEGIN SELECT RAISE(ABORT, 'forecast rejected'); END;",
    )
    .unwrap();
    let seed = CatalogSeed::from_toml_str(
        r#"
        [[document_type]]
        name = "report"

        [[document_type.section]]
        name = "Intro"
        [[document_type.section.subsection]]
        name = "notes"

        [[document_type.section]]
        name = "Numbers"
        [[document_type.section.subsection]]
        name = "forecast"
        "#,
    )
    .unwrap();

    let err = catalog.apply_seed(&seed).unwrap_err();
    assert!(matches!(err, CatalogError::Repo(_)));
    for table in ["document_types", "document_sections", "document_subsections"] {
        let rows: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rows, 0, "{table} kept rows from the failed seed");
    }

    conn.execute_batch("DROP TRIGGER reject_forecast;").unwrap();
    let report = catalog.apply_seed(&seed).unwrap();
    assert_eq!(report.created, ["report"]);
    let definition = catalog
        .resolve_document_type(&by_name("report"))
        .unwrap();
    assert_eq!(definition.subsection_count(), 2);
}

#[test]
fn type_names_resolve_regardless_of_surrounding_whitespace() {
    let conn = setup();
    let cache = CatalogCache::default();
    let catalog = catalog(&conn, cache.clone());

    let padded = DocumentTypeRef::Name(" business-plan\t".to_string());
    let definition = catalog.resolve_document_type(&padded).unwrap();
    assert_eq!(definition.document_type.name, "business-plan");

    assert!(cache.get(&DocumentTypeRef::name("business-plan")).is_some());
    catalog.invalidate(&padded);
    assert!(cache.get(&DocumentTypeRef::name("business-plan")).is_none());

    let err = catalog
        .resolve_document_type(&DocumentTypeRef::name("  pitch-deck "))
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::DocumentTypeNotFound(DocumentTypeRef::Name(name)) if name == "pitch-deck"
    ));
}
