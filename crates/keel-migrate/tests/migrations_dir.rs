//! End-to-end tests over a migrations directory: schema file in,
//! migration directories out.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use keel_core::{DiffOptions, Differ, DialectKind};
use keel_migrate::history::{MIGRATION_FILE, SNAPSHOT_FILE};
use keel_migrate::prelude::*;
use tempfile::TempDir;

const INIT: &str = r#"
datasource db {
  provider = "sqlite"
  url      = "file:dev.db"
}

model User {
  id    Int    @id @default(autoincrement())
  email String @unique

  @@map("users")
}
"#;

const WITH_POSTS: &str = r#"
datasource db {
  provider = "sqlite"
  url      = "file:dev.db"
}

model User {
  id    Int     @id @default(autoincrement())
  email String  @unique
  name  String?
  posts Post[]

  @@map("users")
}

model Post {
  id       Int    @id @default(autoincrement())
  title    String
  authorId Int
  author   User   @relation(fields: [authorId], references: [id], onDelete: Cascade)

  @@map("posts")
}
"#;

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, day)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

fn config(root: &Path, source: &str) -> MigrateConfig {
    let schema = root.join("schema.keel");
    fs::write(&schema, source).unwrap();
    MigrateConfig {
        schema,
        migrations_dir: root.join("migrations"),
        ..MigrateConfig::default()
    }
}

fn create(config: &MigrateConfig, name: &str, created_at: NaiveDateTime) -> Option<String> {
    let schema = read_schema(&config.schema).unwrap();
    let dialect = config.resolve_dialect(&schema).unwrap();
    let history = MigrationHistory::new(&config.migrations_dir);
    let writer = MigrationWriter::new(dialect, config.diff_options(dialect));
    let plan = writer.plan(&history.latest_snapshot().unwrap(), &schema).unwrap();
    if plan.is_empty() {
        return None;
    }
    let path = writer
        .write(history.dir(), name, created_at, &plan)
        .unwrap();
    Some(fs::read_to_string(path.join(MIGRATION_FILE)).unwrap())
}

#[test]
fn migrations_follow_schema_changes() {
    let root = TempDir::new().unwrap();

    let init = config(root.path(), INIT);
    let sql = create(&init, "init", at(1)).unwrap();
    assert_eq!(
        sql,
        "-- CreateTable\n\
         CREATE TABLE \"users\" (\n    \"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,\n    \
         \"email\" TEXT NOT NULL\n);\n\
         CREATE UNIQUE INDEX \"users_email_key\" ON \"users\" (\"email\");\n"
    );
    assert!(create(&init, "noop", at(2)).is_none());

    let posts = config(root.path(), WITH_POSTS);
    let sql = create(&posts, "Add posts", at(3)).unwrap();
    assert_eq!(
        sql,
        "-- CreateTable\n\
         CREATE TABLE \"posts\" (\n    \"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,\n    \
         \"title\" TEXT NOT NULL,\n    \"authorId\" INTEGER NOT NULL,\n    \
         CONSTRAINT \"posts_authorId_fkey\" FOREIGN KEY (\"authorId\") REFERENCES \"users\" (\"id\") \
         ON DELETE CASCADE ON UPDATE CASCADE\n);\n\
         \n\
         -- AddColumn\n\
         ALTER TABLE \"users\" ADD COLUMN \"name\" TEXT;\n"
    );

    let history = MigrationHistory::new(&posts.migrations_dir);
    let ids: Vec<String> = history
        .migrations()
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["20260501120000_init", "20260503120000_add_posts"]);

    let schema = read_schema(&posts.schema).unwrap();
    let status = history
        .status(&schema, &Differ::new(posts.diff_options(DialectKind::Sqlite)))
        .unwrap();
    assert!(status.is_up_to_date());
}

#[test]
fn snapshot_records_dialect() {
    let root = TempDir::new().unwrap();
    let init = config(root.path(), INIT);
    create(&init, "init", at(1)).unwrap();

    let latest = MigrationHistory::new(&init.migrations_dir)
        .latest()
        .unwrap()
        .unwrap();
    let snapshot = latest.load_snapshot().unwrap();
    assert_eq!(snapshot.provider, Some(DialectKind::Sqlite));
    assert!(latest.snapshot_path().ends_with(SNAPSHOT_FILE));

    // A later migration cannot switch dialects.
    let schema = read_schema(&init.schema).unwrap();
    let writer = MigrationWriter::new(
        DialectKind::Postgres,
        DiffOptions::for_dialect(DialectKind::Postgres),
    );
    let err = writer.plan(&snapshot, &schema).unwrap_err();
    assert!(matches!(err, MigrateError::ProviderMismatch { .. }));
}

#[test]
fn unsupported_change_writes_nothing() {
    let root = TempDir::new().unwrap();
    let init = config(root.path(), INIT);
    create(&init, "init", at(1)).unwrap();

    let bounded = config(
        root.path(),
        &INIT.replace("email String @unique", "email String @unique @db.VarChar(320)"),
    );
    let schema = read_schema(&bounded.schema).unwrap();
    let history = MigrationHistory::new(&bounded.migrations_dir);
    let writer = MigrationWriter::new(DialectKind::Sqlite, bounded.diff_options(DialectKind::Sqlite));
    let err = writer
        .plan(&history.latest_snapshot().unwrap(), &schema)
        .unwrap_err();
    assert!(err.to_string().contains("not supported by the sqlite dialect"));
    assert_eq!(history.migrations().unwrap().len(), 1);
}
