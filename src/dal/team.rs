use diesel::prelude::*;

use crate::config::{ConfigSettings, TeamConfig};
use crate::db::{Db, DbError};
use crate::directory::{LdapDirectory, TeamDirectory};
use crate::models::{NewTeam, Team};
use crate::schema::teams;

impl Db {
    /// Makes sure a team called `name` exists. Returns `true` if this call
    /// created it.
    pub fn create_team(&self, name: &str) -> Result<bool, DbError> {
        let inserted = with_conn!(self, DbError::AddTeam, |conn| diesel::insert_into(
            teams::table
        )
        .values(&NewTeam { name })
        .on_conflict(teams::name)
        .do_nothing()
        .execute(conn))?;

        if inserted > 0 {
            info!("created team {}", name);
        }
        Ok(inserted > 0)
    }

    /// Creates the configured teams, then the members of the directory team
    /// group when directory sync is configured.
    pub fn add_teams(&self, config: &ConfigSettings) -> Result<usize, DbError> {
        if config.ldap.is_enabled() {
            let mut directory = LdapDirectory::new(&config.ldap);
            let directory: &mut dyn TeamDirectory = &mut directory;
            self.add_teams_from(&config.teams, Some(directory))
        } else {
            self.add_teams_from(&config.teams, None)
        }
    }

    /// Static teams are committed one by one before the directory is asked, so
    /// a directory failure leaves them in place.
    pub fn add_teams_from(
        &self,
        teams: &[TeamConfig],
        directory: Option<&mut dyn TeamDirectory>,
    ) -> Result<usize, DbError> {
        let mut created = 0;
        for team in teams {
            if self.create_team(&team.name)? {
                created += 1;
            }
        }

        if let Some(directory) = directory {
            let names = directory.team_names().map_err(DbError::Directory)?;
            info!("directory lists {} team(s)", names.len());
            for name in &names {
                if self.create_team(name)? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }

    pub fn get_teams(&self) -> Result<Vec<Team>, DbError> {
        let result = with_conn!(self, DbError::GetTeams, |conn| teams::table
            .select(Team::as_select())
            .order(teams::id)
            .load::<Team>(conn));

        match result {
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn get_team_by_name(&self, name: &str) -> Result<Option<Team>, DbError> {
        with_conn!(self, DbError::GetTeams, |conn| teams::table
            .filter(teams::name.eq(name))
            .select(Team::as_select())
            .first::<Team>(conn)
            .optional())
    }
}
