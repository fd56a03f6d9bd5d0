use diesel::prelude::*;
use diesel::result::Error as DieselError;

use crate::db::{Db, DbError, ResetStrategy};
use crate::schema::{rounds, service_checks, slas};

const TRUNCATE_HISTORY: &str = "TRUNCATE TABLE service_checks, rounds, slas CASCADE";

impl Db {
    /// Deletes every round, service check and SLA penalty. Boxes, teams and
    /// everything else are left alone.
    ///
    /// Either all three tables are emptied or none are.
    pub fn reset_scores(&self) -> Result<(), DbError> {
        let strategy = self.dialect().reset_strategy();
        with_conn!(self, DbError::ResetScores, |conn| match strategy {
            ResetStrategy::TruncateCascade => diesel::sql_query(TRUNCATE_HISTORY)
                .execute(conn)
                .map(|_| ()),
            ResetStrategy::DeleteInTransaction => {
                conn.transaction::<_, DieselError, _>(|conn| {
                    // children first; they reference rounds
                    let checks = diesel::delete(service_checks::table).execute(conn)?;
                    let penalties = diesel::delete(slas::table).execute(conn)?;
                    let played = diesel::delete(rounds::table).execute(conn)?;
                    debug!(
                        "deleted {} service checks, {} slas, {} rounds",
                        checks, penalties, played
                    );
                    Ok(())
                })
            }
        })?;

        info!("scoring history reset ({:?})", strategy);
        Ok(())
    }
}
