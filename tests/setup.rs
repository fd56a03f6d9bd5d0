use quotient_db::{BoxConfig, ConfigSettings, Db, Dialect, Target};
use tempfile::TempDir;

fn fresh_store() -> (TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::connect_to(&Target::Embedded(dir.path().join("quotient.db"))).unwrap();
    (dir, db)
}

#[test]
fn provision_list_and_rename() {
    let (_dir, db) = fresh_store();
    assert_eq!(db.dialect(), Dialect::Sqlite);

    let configs = ["10.0.0.1", "10.0.0.2"]
        .iter()
        .map(|ip| BoxConfig {
            ip: ip.to_string(),
            hostname: None,
        })
        .collect::<Vec<_>>();
    db.load_boxes(&configs).unwrap();

    let boxes = db.get_boxes().unwrap();
    assert_eq!(boxes.len(), 2);
    assert!(boxes.iter().all(|b| b.ports.is_empty()));

    let mut first = boxes[0].clone();
    first.hostname = Some("db1".to_owned());
    db.update_box(first).unwrap();

    let after = db.get_boxes().unwrap();
    assert_eq!(after[0].ip, "10.0.0.1");
    assert_eq!(after[0].hostname.as_deref(), Some("db1"));
    assert_eq!(after[1], boxes[1]);
}

#[test]
fn setup_from_config_file_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            r#"
            [database]
            connect_url = "sqlite"
            sqlite_path = "{}"

            [[team]]
            name = "Alpha"

            [[team]]
            name = "Bravo"

            [[box]]
            ip = "10.0.0.1"
            hostname = "web"

            [[box]]
            ip = "10.0.0.2"
            "#,
            dir.path().join("state").join("quotient.db").display()
        ),
    )
    .unwrap();

    let config = ConfigSettings::from_file(&path).unwrap();
    let db = Db::connect_to(&config.database.target()).unwrap();

    for _ in 0..2 {
        db.load_boxes(&config.boxes).unwrap();
        db.add_teams(&config).unwrap();
    }

    let teams = db
        .get_teams()
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect::<Vec<_>>();
    assert_eq!(teams, vec!["Alpha", "Bravo"]);
    assert_eq!(db.get_boxes().unwrap().len(), 2);

    db.reset_scores().unwrap();
    assert_eq!(db.get_teams().unwrap().len(), 2);
    assert_eq!(db.get_boxes().unwrap().len(), 2);
}
