use diesel::prelude::*;
use diesel::result::Error::{self as DieselError, NotFound};

use crate::config::BoxConfig;
use crate::db::{Db, DbError, Dialect};
use crate::models::{Attack, BoxChanges, BoxPort, BoxRow, NewBox, ScoredBox, Vector};
use crate::schema::{attacks, box_ports, boxes, vectors};

const SYNC_BOX_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('boxes', 'id'), (SELECT MAX(id) FROM boxes))";

/// Loads the ports, vectors and attacks of `$rows` and assembles them into
/// `ScoredBox`es, keeping the order of `$rows`.
macro_rules! with_children {
    ($conn:ident, $rows:expr) => {{
        let rows: Vec<BoxRow> = $rows;
        (|| -> QueryResult<Vec<ScoredBox>> {
            let ports = BoxPort::belonging_to(&rows)
                .select(BoxPort::as_select())
                .order(box_ports::port)
                .load::<BoxPort>($conn)?
                .grouped_by(&rows);
            let vectors = Vector::belonging_to(&rows)
                .select(Vector::as_select())
                .order(vectors::id)
                .load::<Vector>($conn)?
                .grouped_by(&rows);
            let attacks = Attack::belonging_to(&rows)
                .select(Attack::as_select())
                .order(attacks::id)
                .load::<Attack>($conn)?
                .grouped_by(&rows);

            Ok(rows
                .into_iter()
                .zip(ports)
                .zip(vectors)
                .zip(attacks)
                .map(|(((row, ports), vectors), attacks)| {
                    ScoredBox::assemble(row, ports, vectors, attacks)
                })
                .collect())
        })()
    }};
}

impl Db {
    /// Creates a box for every configured IP that doesn't have one yet.
    ///
    /// The whole batch runs in one transaction; if any insert fails nothing is
    /// committed. Returns how many boxes were created.
    pub fn load_boxes(&self, configs: &[BoxConfig]) -> Result<usize, DbError> {
        let created = with_conn!(self, DbError::LoadBoxes, |conn| conn
            .transaction::<_, DieselError, _>(|conn| {
                configs.iter().try_fold(0, |created, config| {
                    diesel::insert_into(boxes::table)
                        .values(&NewBox {
                            ip: &config.ip,
                            hostname: config.hostname.as_deref(),
                        })
                        .on_conflict(boxes::ip)
                        .do_nothing()
                        .execute(conn)
                        .map(|inserted| created + inserted)
                })
            }))?;

        info!(
            "loaded {} box(es) from config, {} new",
            configs.len(),
            created
        );
        Ok(created)
    }

    /// Every box with its ports, vectors and attacks, ordered by id.
    pub fn get_boxes(&self) -> Result<Vec<ScoredBox>, DbError> {
        let result = with_conn!(self, DbError::GetBoxes, |conn| boxes::table
            .select(BoxRow::as_select())
            .order(boxes::id)
            .load::<BoxRow>(conn)
            .and_then(|rows| with_children!(conn, rows)));

        match result {
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn get_box_by_ip(&self, ip: &str) -> Result<Option<ScoredBox>, DbError> {
        let result = with_conn!(self, DbError::GetBoxes, |conn| boxes::table
            .filter(boxes::ip.eq(ip))
            .select(BoxRow::as_select())
            .first::<BoxRow>(conn)
            .and_then(|row| with_children!(conn, vec![row])));

        match result {
            Ok(mut found) => Ok(found.pop()),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Saves `scored_box`: its IP, hostname and port set replace whatever is
    /// stored under its id. A box with a zero or unknown id is inserted
    /// instead. Returns the stored result.
    ///
    /// Vectors and attacks are left as they are.
    pub fn update_box(&self, scored_box: ScoredBox) -> Result<ScoredBox, DbError> {
        let id = scored_box.id;
        let ports = scored_box.port_numbers();
        let changes = BoxChanges {
            ip: &scored_box.ip,
            hostname: scored_box.hostname.as_deref(),
        };
        let server = self.dialect() == Dialect::Postgres;

        let mut saved = with_conn!(self, DbError::UpdateBox, |conn| conn
            .transaction::<_, DieselError, _>(|conn| {
                let updated = if id != 0 {
                    diesel::update(boxes::table.find(id))
                        .set(&changes)
                        .execute(conn)?
                } else {
                    0
                };

                if updated == 0 && id != 0 {
                    diesel::insert_into(boxes::table)
                        .values((
                            boxes::id.eq(id),
                            boxes::ip.eq(changes.ip),
                            boxes::hostname.eq(changes.hostname),
                        ))
                        .execute(conn)?;
                    if server {
                        // explicit ids bypass the serial sequence
                        diesel::sql_query(SYNC_BOX_SEQUENCE).execute(conn)?;
                    }
                } else if updated == 0 {
                    diesel::insert_into(boxes::table)
                        .values(&NewBox {
                            ip: changes.ip,
                            hostname: changes.hostname,
                        })
                        .execute(conn)?;
                }

                let row = boxes::table
                    .filter(boxes::ip.eq(changes.ip))
                    .select(BoxRow::as_select())
                    .first::<BoxRow>(conn)?;
                diesel::delete(box_ports::table.filter(box_ports::box_id.eq(row.id)))
                    .execute(conn)?;
                for &port in &ports {
                    diesel::insert_into(box_ports::table)
                        .values(&BoxPort {
                            box_id: row.id,
                            port,
                        })
                        .execute(conn)?;
                }

                with_children!(conn, vec![row])
            }))?;

        let saved = saved.pop().ok_or(DbError::UpdateBox(NotFound))?;
        debug!("saved box {} ({})", saved.id, saved.ip);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn box_config(ip: &str, hostname: Option<&str>) -> BoxConfig {
        BoxConfig {
            ip: ip.to_owned(),
            hostname: hostname.map(str::to_owned),
        }
    }

    #[test]
    fn loading_twice_creates_no_duplicates() {
        let (_dir, db) = test_support::embedded();
        let configs = vec![
            box_config("10.0.0.1", None),
            box_config("10.0.0.2", None),
            box_config("10.0.0.1", None),
        ];

        assert_eq!(db.load_boxes(&configs).unwrap(), 2);
        assert_eq!(db.load_boxes(&configs).unwrap(), 0);

        let ips = db
            .get_boxes()
            .unwrap()
            .into_iter()
            .map(|b| b.ip)
            .collect::<Vec<_>>();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn first_hostname_keeps_the_ip() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", Some("web"))])
            .unwrap();
        db.load_boxes(&[box_config("10.0.0.1", Some("db"))])
            .unwrap();

        let boxes = db.get_boxes().unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].hostname.as_deref(), Some("web"));
    }

    #[test]
    fn failed_insert_rolls_back_the_batch() {
        let (_dir, db) = test_support::embedded();
        let err = db
            .load_boxes(&[
                box_config("10.0.0.1", None),
                box_config("", None),
                box_config("10.0.0.3", None),
            ])
            .unwrap_err();

        assert!(matches!(err, DbError::LoadBoxes(_)));
        assert!(db.get_boxes().unwrap().is_empty());
    }

    #[test]
    fn listing_an_empty_store_is_not_an_error() {
        let (_dir, db) = test_support::embedded();
        assert!(db.get_boxes().unwrap().is_empty());
        assert_eq!(db.get_box_by_ip("10.0.0.1").unwrap(), None);
    }

    #[test]
    fn collections_are_empty_not_missing() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", None)]).unwrap();

        let found = db.get_box_by_ip("10.0.0.1").unwrap().unwrap();
        assert!(found.ports.is_empty());
        assert!(found.vectors.is_empty());
        assert!(found.attacks.is_empty());

        let decoded: ScoredBox =
            serde_json::from_str(r#"{"id": 1, "ip": "10.0.0.1", "hostname": null}"#).unwrap();
        assert_eq!(decoded.ports, Vec::new());
    }

    #[test]
    fn update_replaces_hostname_and_ports() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", Some("old"))])
            .unwrap();
        let mut target = db.get_box_by_ip("10.0.0.1").unwrap().unwrap();
        let id = target.id;

        target.hostname = Some("db1".to_owned());
        target.ports = vec![
            BoxPort { box_id: id, port: 5432 },
            BoxPort { box_id: id, port: 22 },
            BoxPort { box_id: id, port: 22 },
        ];
        let saved = db.update_box(target).unwrap();
        assert_eq!(saved.hostname.as_deref(), Some("db1"));
        assert_eq!(saved.port_numbers(), vec![22, 5432]);
        assert_eq!(saved.ports.len(), 2);

        let mut target = saved;
        target.hostname = None;
        target.ports = vec![BoxPort { box_id: 0, port: 80 }];
        let saved = db.update_box(target).unwrap();
        assert_eq!(saved.hostname, None);
        assert_eq!(saved.ports, vec![BoxPort { box_id: id, port: 80 }]);

        assert_eq!(db.get_boxes().unwrap(), vec![saved]);
    }

    fn unsaved(id: i32, ip: &str, ports: &[i32]) -> ScoredBox {
        ScoredBox {
            id,
            ip: ip.to_owned(),
            hostname: Some("new".to_owned()),
            ports: ports
                .iter()
                .map(|&port| BoxPort { box_id: id, port })
                .collect(),
            vectors: Vec::new(),
            attacks: Vec::new(),
        }
    }

    #[test]
    fn saving_a_box_without_id_creates_it() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", None)]).unwrap();

        let saved = db.update_box(unsaved(0, "10.0.0.9", &[22])).unwrap();
        assert_ne!(saved.id, 0);
        assert_eq!(saved.hostname.as_deref(), Some("new"));
        assert_eq!(saved.ports, vec![BoxPort { box_id: saved.id, port: 22 }]);

        let stored = db.get_box_by_ip("10.0.0.9").unwrap().unwrap();
        assert_eq!(stored, saved);
        assert_eq!(db.get_boxes().unwrap().len(), 2);
    }

    #[test]
    fn saving_an_unknown_id_inserts_it() {
        let (_dir, db) = test_support::embedded();

        let saved = db.update_box(unsaved(42, "10.0.0.42", &[80, 443])).unwrap();
        assert_eq!(saved.id, 42);
        assert_eq!(saved.port_numbers(), vec![80, 443]);
        assert_eq!(db.get_boxes().unwrap(), vec![saved]);

        // later boxes still get fresh ids
        db.load_boxes(&[box_config("10.0.0.43", None)]).unwrap();
        let next = db.get_box_by_ip("10.0.0.43").unwrap().unwrap();
        assert!(next.id > 42);
    }

    #[test]
    fn inserting_a_taken_ip_fails() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", Some("web"))]).unwrap();
        let before = db.get_boxes().unwrap();

        let err = db.update_box(unsaved(0, "10.0.0.1", &[22])).unwrap_err();
        assert!(matches!(err, DbError::UpdateBox(_)));
        assert_eq!(db.get_boxes().unwrap(), before);
    }

    #[test]
    fn out_of_range_port_rolls_back_the_update() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", Some("web"))]).unwrap();
        let mut target = db.get_box_by_ip("10.0.0.1").unwrap().unwrap();
        target.ports = vec![BoxPort { box_id: target.id, port: 22 }];
        let before = db.update_box(target.clone()).unwrap();

        for port in &[-5, 65536, 99999] {
            target.hostname = Some("renamed".to_owned());
            target.ports = vec![BoxPort { box_id: target.id, port: *port }];
            let err = db.update_box(target.clone()).unwrap_err();
            assert!(matches!(err, DbError::UpdateBox(_)));
            assert_eq!(db.get_boxes().unwrap(), vec![before.clone()]);
        }
    }

    #[test]
    fn ip_collision_on_update_changes_nothing() {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", None), box_config("10.0.0.2", None)])
            .unwrap();
        let before = db.get_boxes().unwrap();

        let mut second = before[1].clone();
        second.ip = "10.0.0.1".to_owned();
        second.ports = vec![BoxPort { box_id: second.id, port: 22 }];
        let err = db.update_box(second).unwrap_err();

        assert!(matches!(err, DbError::UpdateBox(_)));
        assert!(!err.is_not_found());
        assert_eq!(db.get_boxes().unwrap(), before);
    }

    #[test]
    fn vectors_and_attacks_are_loaded_with_their_box() -> Result<(), DbError> {
        let (_dir, db) = test_support::embedded();
        db.load_boxes(&[box_config("10.0.0.1", None), box_config("10.0.0.2", None)])?;
        let second = db.get_box_by_ip("10.0.0.2")?.unwrap();

        let sql = format!(
            "INSERT INTO vectors (box_id, port, protocol) VALUES ({id}, 22, 'tcp'); \
             INSERT INTO attacks (box_id, vector_id) VALUES ({id}, 1);",
            id = second.id
        );
        with_conn!(db, DbError::LoadBoxes, |conn| {
            diesel::connection::SimpleConnection::batch_execute(conn, &sql)
        })?;

        let boxes = db.get_boxes()?;
        assert!(boxes[0].vectors.is_empty());
        assert_eq!(boxes[1].vectors.len(), 1);
        assert_eq!(boxes[1].vectors[0].port, 22);
        assert_eq!(boxes[1].attacks.len(), 1);
        assert_eq!(boxes[1].attacks[0].vector_id, Some(boxes[1].vectors[0].id));

        // replacing ports leaves the attack surface alone
        let mut second = boxes[1].clone();
        second.ports = vec![BoxPort { box_id: second.id, port: 22 }];
        let saved = db.update_box(second)?;
        assert_eq!(saved.vectors, boxes[1].vectors);
        assert_eq!(saved.attacks, boxes[1].attacks);
        Ok(())
    }
}
