//! Integration tests for the concurrent entity pipeline

use chrono::Utc;
use entiform_core::{EntityFile, ErrorClass, FatalError, ProcessedEntity};
use entiform_engine::{FsReader, MemoryReader, Pipeline, PipelineOptions};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, HashSet};
use std::fs;

fn entity_yaml(property: &str, code: &str) -> String {
    format!(
        r#"module: crm
object: contact
property: {property}
code: {code}
name: Contact {property}
fields:
  - code: value
    name: Value
    type: string
    pattern: "^.+@.+$"
    required: true
  - code: since
    type: string
    pattern: YYYY-MM-DD
"#
    )
}

fn quiet() -> PipelineOptions {
    PipelineOptions::default().with_progress(false)
}

fn file(path: &str) -> EntityFile {
    EntityFile::new(path, 0, Utc::now())
}

fn by_path<'a>(processed: &'a [ProcessedEntity], path: &str) -> Option<&'a ProcessedEntity> {
    processed.iter().find(|p| p.file.display_path() == path)
}

#[test]
fn test_dedup_is_stable_across_worker_counts() {
    let mut reader = MemoryReader::new();
    let mut files = Vec::new();
    for copy in 0..4 {
        for distinct in 0..5 {
            let path = format!("entities/{}_{}.yml", distinct, copy);
            reader.insert(path.as_str(), entity_yaml("email", &format!("c{}", distinct)));
            files.push(file(&path));
        }
    }

    // Records by fingerprint from the single-worker run
    let mut baseline: Option<BTreeMap<String, (Vec<String>, String)>> = None;

    for workers in [1, 2, 4, 8, 16, 0] {
        let pipeline = Pipeline::with_reader(reader.clone(), quiet());
        let output = pipeline.process(files.clone(), workers).unwrap();

        assert_eq!(output.processed.len(), 5, "workers = {}", workers);
        assert_eq!(output.duplicates, 15);
        assert!(output.fatal_errors.is_empty());
        assert!(!output.is_failing());

        let fingerprints: HashSet<_> = output.processed.iter().map(|p| p.fingerprint).collect();
        assert_eq!(fingerprints.len(), 5);

        let records: BTreeMap<String, (Vec<String>, String)> = output
            .processed
            .iter()
            .map(|p| {
                let schema = serde_json::to_string(&p.schema).unwrap();
                (p.fingerprint.to_hex(), (p.error_messages(), schema))
            })
            .collect();

        let expected = baseline.get_or_insert_with(|| records.clone()).clone();
        assert_eq!(records, expected, "workers = {}", workers);
    }
}

#[test]
fn test_blank_keys_are_never_registered() {
    let reader = MemoryReader::new()
        .with_document("first.yml", "name: First\nfields:\n  - code: a\n    type: string\n")
        .with_document("second.yml", "name: Second\nfields:\n  - code: b\n    type: number\n");
    let files = vec![file("first.yml"), file("second.yml")];

    for workers in [1, 2] {
        let output = Pipeline::with_reader(reader.clone(), quiet())
            .process(files.clone(), workers)
            .unwrap();

        assert_eq!(output.processed.len(), 2);
        assert_eq!(output.duplicates, 0);

        for entity in &output.processed {
            assert!(entity.errors.iter().all(|e| e.class != ErrorClass::ConflictError));
            assert_eq!(
                entity.error_messages(),
                vec!["missing: module", "missing: object", "missing: property", "missing: code"]
            );
        }
    }
}

#[test]
fn test_identical_copies_and_key_conflict() {
    let content = entity_yaml("email", "primary");
    let variant = content.replace("name: Contact email", "name: Contact e-mail");

    let reader = MemoryReader::new()
        .with_document("A.yml", content.clone())
        .with_document("B.yml", content)
        .with_document("C.yml", variant);
    let files = vec![file("A.yml"), file("B.yml"), file("C.yml")];

    for workers in [1, 3] {
        let output = Pipeline::with_reader(reader.clone(), quiet())
            .process(files.clone(), workers)
            .unwrap();

        assert_eq!(output.processed.len(), 2);
        assert_eq!(output.duplicates, 1);
        assert!(output.is_failing());

        let conflicted: Vec<&ProcessedEntity> =
            output.processed.iter().filter(|p| !p.errors.is_empty()).collect();
        assert_eq!(conflicted.len(), 1);

        let loser = conflicted[0];
        let holder = output
            .processed
            .iter()
            .find(|p| p.errors.is_empty())
            .unwrap();

        assert_eq!(loser.errors.len(), 1);
        assert_eq!(loser.errors[0].class, ErrorClass::ConflictError);
        assert_eq!(
            loser.errors[0].message,
            format!(
                "entity key conflict: 'crm.contact.email.primary' already defined in '{}'",
                holder.file.display_path()
            )
        );

        // Schema only on the clean record
        assert!(loser.schema.is_none());
        assert!(holder.schema.is_some());
    }
}

#[test]
fn test_empty_input() {
    let output = Pipeline::with_reader(MemoryReader::new(), quiet())
        .process(Vec::new(), 4)
        .unwrap();

    assert!(output.processed.is_empty());
    assert!(output.fatal_errors.is_empty());
    assert!(!output.is_failing());
}

#[test]
fn test_fatal_errors_are_isolated() {
    let reader = MemoryReader::new()
        .with_document("good.yml", entity_yaml("email", "primary"))
        .with_document("broken.yml", "module: [crm\n")
        .with_document("list.yml", "- a\n- b\n")
        .with_document("other.yml", entity_yaml("phone", "mobile"));
    let files = vec![
        file("good.yml"),
        file("broken.yml"),
        file("list.yml"),
        file("other.yml"),
        file("absent.yml"),
    ];

    let output = Pipeline::with_reader(reader, quiet()).process(files, 2).unwrap();

    assert_eq!(output.processed.len(), 2);
    assert!(output.processed.iter().all(|p| p.is_valid()));
    assert_eq!(output.fatal_errors.len(), 3);
    assert!(output.is_failing());

    let mut failed: Vec<&str> = output.fatal_errors.iter().map(|f| f.path.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["absent.yml", "broken.yml", "list.yml"]);

    for failure in &output.fatal_errors {
        match failure.path.as_str() {
            "absent.yml" => assert!(matches!(failure.error, FatalError::Io(_))),
            "broken.yml" => assert!(matches!(failure.error, FatalError::Transcode(_))),
            "list.yml" => assert_eq!(failure.error, FatalError::NotAnObject),
            other => panic!("unexpected failure for {}", other),
        }
    }
}

#[test]
fn test_findings_are_reported_per_file() {
    let bounds = entity_yaml("age", "years").replace(
        "    pattern: YYYY-MM-DD\n",
        "    pattern: YYYY-MM-DD\n  - code: n\n    type: integer\n    min: 10\n    max: 1\n",
    );
    let empty_fields = "module: crm\nobject: contact\nproperty: x\ncode: y\nname: Y\nfields: []\n";

    let reader = MemoryReader::new()
        .with_document("bounds.yml", bounds)
        .with_document("empty.yml", empty_fields);
    let files = vec![file("bounds.yml"), file("empty.yml")];

    let output = Pipeline::with_reader(reader, quiet()).process(files, 0).unwrap();
    assert_eq!(output.processed.len(), 2);

    let bounds = by_path(&output.processed, "bounds.yml").unwrap();
    assert_eq!(bounds.error_messages(), vec!["field n: min cannot be greater than max"]);
    assert!(bounds.schema.is_none());

    let empty = by_path(&output.processed, "empty.yml").unwrap();
    assert_eq!(empty.error_messages(), vec!["fields array empty"]);
    assert_eq!(empty.errors[0].class, ErrorClass::StructuralError);

    let stats = output.stats();
    assert_eq!(stats.with_errors, 2);
    assert_eq!(stats.total_errors, 2);
}

#[test]
fn test_date_shorthand_in_derived_schema() {
    let reader = MemoryReader::new().with_document("a.yml", entity_yaml("email", "primary"));
    let output = Pipeline::with_reader(reader, quiet())
        .process(vec![file("a.yml")], 1)
        .unwrap();

    let schema = output.processed[0].schema.as_ref().unwrap();
    assert_eq!(schema["properties"]["since"]["pattern"], r"^\d{4}-\d{2}-\d{2}$");
    assert_eq!(schema["properties"]["since"]["format"], "date");
    assert_eq!(schema["$id"], "/crm/contact/primary/schema.json");
}

#[test]
fn test_schema_is_deterministic_across_runs() {
    let mut reader = MemoryReader::new();
    let mut files = Vec::new();
    for i in 0..12 {
        let path = format!("{}.yml", i);
        reader.insert(path.as_str(), entity_yaml("email", &format!("code{}", i)));
        files.push(file(&path));
    }

    let first = Pipeline::with_reader(reader.clone(), quiet()).process(files.clone(), 4).unwrap();
    let second = Pipeline::with_reader(reader, quiet()).process(files, 3).unwrap();

    for entity in &first.processed {
        let path = entity.file.display_path();
        let other = by_path(&second.processed, &path).unwrap();
        assert_eq!(
            serde_json::to_string(&entity.schema).unwrap(),
            serde_json::to_string(&other.schema).unwrap()
        );
    }
}

#[test]
fn test_package_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("package.yml"),
        "name: crm-base\nversion: 0.1.0\nregion: ru\n",
    )
    .unwrap();

    let entities = dir.path().join("entities/crm");
    fs::create_dir_all(&entities).unwrap();
    fs::write(entities.join("email.yml"), entity_yaml("email", "primary")).unwrap();
    fs::write(entities.join("email_copy.yaml"), entity_yaml("email", "primary")).unwrap();
    fs::write(entities.join("phone.yml"), entity_yaml("phone", "mobile")).unwrap();
    fs::write(entities.join("notes.txt"), "not an entity").unwrap();

    let package = entiform_package::Package::load(dir.path()).unwrap();
    assert_eq!(package.entity_count(), 3);

    let output = Pipeline::with_reader(FsReader, quiet())
        .process(package.files, 0)
        .unwrap();

    assert_eq!(output.processed.len(), 2);
    assert_eq!(output.duplicates, 1);
    assert!(!output.is_failing());
}
