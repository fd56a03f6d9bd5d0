use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{
    announcement_files, announcements, attack_images, attacks, box_ports, boxes, inject_files,
    injects, manual_adjustments, rounds, service_checks, slas, submissions, teams, vectors, vulns,
};

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = teams)]
pub struct NewTeam<'a> {
    pub name: &'a str,
}

/// A row of `boxes` without its child collections. Use [`ScoredBox`] outside
/// of the data layer.
#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = boxes)]
pub struct BoxRow {
    pub id: i32,
    pub ip: String,
    pub hostname: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = boxes)]
pub struct NewBox<'a> {
    pub ip: &'a str,
    pub hostname: Option<&'a str>,
}

/// Full replacement of a box's own columns; a `None` hostname clears it.
#[derive(AsChangeset)]
#[diesel(table_name = boxes, treat_none_as_null = true)]
pub struct BoxChanges<'a> {
    pub ip: &'a str,
    pub hostname: Option<&'a str>,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Queryable,
    Selectable,
    Identifiable,
    Associations,
    Insertable,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = box_ports, primary_key(box_id, port), belongs_to(BoxRow, foreign_key = box_id))]
pub struct BoxPort {
    pub box_id: i32,
    pub port: i32,
}

#[derive(
    Clone, Debug, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize,
)]
#[diesel(table_name = vectors, belongs_to(BoxRow, foreign_key = box_id))]
pub struct Vector {
    pub id: i32,
    pub box_id: i32,
    pub vuln_id: Option<i32>,
    pub port: i32,
    pub protocol: String,
}

#[derive(
    Clone, Debug, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize,
)]
#[diesel(table_name = attacks, belongs_to(BoxRow, foreign_key = box_id))]
pub struct Attack {
    pub id: i32,
    pub box_id: i32,
    pub vector_id: Option<i32>,
    pub team_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

/// A scored host with its ports, attack vectors and attacks.
///
/// Collections are always materialized: a box with no ports carries an empty
/// `ports`, and a serialized box missing a collection deserializes to an
/// empty one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredBox {
    pub id: i32,
    pub ip: String,
    pub hostname: Option<String>,
    #[serde(default)]
    pub ports: Vec<BoxPort>,
    #[serde(default)]
    pub vectors: Vec<Vector>,
    #[serde(default)]
    pub attacks: Vec<Attack>,
}

impl ScoredBox {
    pub(crate) fn assemble(
        row: BoxRow,
        ports: Vec<BoxPort>,
        vectors: Vec<Vector>,
        attacks: Vec<Attack>,
    ) -> Self {
        ScoredBox {
            id: row.id,
            ip: row.ip,
            hostname: row.hostname,
            ports,
            vectors,
            attacks,
        }
    }

    /// Port numbers, deduplicated and sorted.
    pub fn port_numbers(&self) -> Vec<i32> {
        let mut ports = self.ports.iter().map(|p| p.port).collect::<Vec<_>>();
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = rounds)]
pub struct Round {
    pub id: i32,
    pub start_time: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = rounds)]
pub struct NewRound {
    pub start_time: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = service_checks)]
pub struct ServiceCheck {
    pub team_id: i32,
    pub round_id: i32,
    pub service_name: String,
    pub points: i32,
    pub result: bool,
    pub error: String,
    pub debug: String,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = slas)]
pub struct Sla {
    pub id: i32,
    pub team_id: i32,
    pub round_id: i32,
    pub service_name: String,
    pub penalty: i32,
}

#[derive(Insertable)]
#[diesel(table_name = slas)]
pub struct NewSla<'a> {
    pub team_id: i32,
    pub round_id: i32,
    pub service_name: &'a str,
    pub penalty: i32,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = manual_adjustments)]
pub struct ManualAdjustment {
    pub id: i32,
    pub team_id: i32,
    pub amount: i32,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = injects)]
pub struct Inject {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub open_time: NaiveDateTime,
    pub due_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = inject_files)]
pub struct InjectFile {
    pub id: i32,
    pub inject_id: i32,
    pub file_name: String,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = submissions)]
pub struct Submission {
    pub id: i32,
    pub inject_id: i32,
    pub team_id: i32,
    pub submission_time: NaiveDateTime,
    pub file_name: String,
    pub graded: bool,
    pub score: i32,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = vulns)]
pub struct Vuln {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = announcements)]
pub struct Announcement {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub open_time: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = announcement_files)]
pub struct AnnouncementFile {
    pub id: i32,
    pub announcement_id: i32,
    pub file_name: String,
}

#[derive(Clone, Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = attack_images)]
pub struct AttackImage {
    pub id: i32,
    pub attack_id: i32,
    pub file_name: String,
}
