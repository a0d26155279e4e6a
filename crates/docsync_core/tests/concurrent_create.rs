use docsync_core::db::open_db;
use docsync_core::{
    CatalogCache, CatalogSeed, ContentItem, DocumentContent, DocumentRepository, DocumentService,
    DocumentTypeRef, SchemaCatalog, SqliteCatalogRepository, SqliteDocumentRepository,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Barrier;
use uuid::Uuid;

const WRITERS: usize = 6;

const SEED: &str = r#"
[[document_type]]
name = "business-plan"

[[document_type.section]]
name = "Overview"

[[document_type.section.subsection]]
name = "summary"

[[document_type.section.subsection]]
name = "mission"

[[document_type.section]]
name = "Market"

[[document_type.section.subsection]]
name = "competitors"
"#;

type Service<'conn> =
    DocumentService<SqliteCatalogRepository<'conn>, SqliteDocumentRepository<'conn>>;

fn with_service<'conn, T>(conn: &'conn Connection, run: impl FnOnce(&Service<'conn>) -> T) -> T {
    let catalog = SchemaCatalog::new(
        SqliteCatalogRepository::try_new(conn).unwrap(),
        CatalogCache::default(),
    );
    let service = DocumentService::new(catalog, SqliteDocumentRepository::try_new(conn).unwrap());
    run(&service)
}

fn prepare(path: &Path) -> Uuid {
    let conn = open_db(path).unwrap();
    let project_id = Uuid::new_v4();
    with_service(&conn, |service| {
        service
            .catalog()
            .apply_seed(&CatalogSeed::from_toml_str(SEED).unwrap())
            .unwrap();
    });
    SqliteDocumentRepository::try_new(&conn)
        .unwrap()
        .insert_project(project_id, "Acme")
        .unwrap();
    project_id
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn concurrent_first_creates_yield_one_materialized_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docsync.sqlite3");
    let project_id = prepare(&path);
    let lookup = DocumentTypeRef::Name("business-plan".to_string());
    let barrier = Barrier::new(WRITERS);

    let ids: Vec<Uuid> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                scope.spawn(|| {
                    let conn = open_db(&path).unwrap();
                    with_service(&conn, |service| {
                        barrier.wait();
                        service
                            .create_document(project_id, &lookup, None)
                            .unwrap()
                            .document
                            .id
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert!(ids.iter().all(|id| *id == ids[0]));

    let conn = open_db(&path).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM documents;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM document_content;"), 3);
}

#[test]
fn concurrent_updates_of_one_subsection_leave_one_cell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docsync.sqlite3");
    let project_id = prepare(&path);
    let lookup = DocumentTypeRef::Name("business-plan".to_string());
    {
        let conn = open_db(&path).unwrap();
        with_service(&conn, |service| {
            service.create_document(project_id, &lookup, None).unwrap();
        });
    }
    let barrier = Barrier::new(WRITERS);

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let barrier = &barrier;
            let lookup = &lookup;
            let path = &path;
            scope.spawn(move || {
                let conn = open_db(path).unwrap();
                with_service(&conn, |service| {
                    barrier.wait();
                    service
                        .update_content(
                            project_id,
                            lookup,
                            &[ContentItem::by_name(
                                "competitors",
                                DocumentContent::text(format!("writer {writer}")),
                            )],
                        )
                        .unwrap();
                });
            });
        }
    });

    let conn = open_db(&path).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM document_content;"), 3);
    let contents = with_service(&conn, |service| {
        service.get_document_contents(project_id, &lookup).unwrap()
    });
    let competitors = contents.cell_for("competitors").unwrap();
    assert!(matches!(
        &competitors.cell.content,
        DocumentContent::Text(value) if value.starts_with("writer ")
    ));
}
