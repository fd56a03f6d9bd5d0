//! Team identities pulled from an LDAP group.

use std::error::Error as StdError;

use ldap3::{ldap_escape, LdapConn, LdapError, Scope, SearchEntry};

use crate::config::LdapSettings;

/// The attribute whose value becomes the team name.
pub const ACCOUNT_ATTRIBUTE: &str = "sAMAccountName";

/// A source of team names outside the static configuration.
pub trait TeamDirectory {
    fn team_names(&mut self) -> Result<Vec<String>, DirectoryError>;
}

#[derive(Debug, Display)]
pub enum DirectoryError {
    #[display(fmt = "couldn't connect to directory: {}", _0)]
    Connect(LdapError),
    #[display(fmt = "couldn't bind to directory: {}", _0)]
    Bind(LdapError),
    #[display(fmt = "directory search failed: {}", _0)]
    Search(LdapError),
}

impl StdError for DirectoryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DirectoryError::Connect(err)
            | DirectoryError::Bind(err)
            | DirectoryError::Search(err) => Some(err),
        }
    }
}

/// Builds the search filter for people in the team group.
pub fn member_filter(team_group_dn: &str) -> String {
    format!(
        "(&(objectClass=person)(memberOf={}))",
        ldap_escape(team_group_dn)
    )
}

/// Looks up members of the configured team group.
pub struct LdapDirectory<'a> {
    settings: &'a LdapSettings,
}

impl<'a> LdapDirectory<'a> {
    pub fn new(settings: &'a LdapSettings) -> Self {
        LdapDirectory { settings }
    }
}

impl TeamDirectory for LdapDirectory<'_> {
    fn team_names(&mut self) -> Result<Vec<String>, DirectoryError> {
        let settings = self.settings;
        let mut session = Session::open(&settings.connect_url)?;

        session
            .conn
            .simple_bind(&settings.bind_dn, &settings.bind_password)
            .and_then(|result| result.success())
            .map_err(DirectoryError::Bind)?;

        let filter = member_filter(&settings.team_group_dn);
        let (entries, _) = session
            .conn
            .search(
                &settings.search_base_dn,
                Scope::Subtree,
                &filter,
                vec![ACCOUNT_ATTRIBUTE],
            )
            .and_then(|result| result.success())
            .map_err(DirectoryError::Search)?;
        debug!("directory returned {} entries", entries.len());

        let names = entries
            .into_iter()
            .map(SearchEntry::construct)
            .filter_map(|entry| match account_name(&entry) {
                Some(name) => Some(name),
                None => {
                    warn!("skipping directory entry without account name: {}", entry.dn);
                    None
                }
            })
            .collect();
        Ok(names)
    }
}

fn account_name(entry: &SearchEntry) -> Option<String> {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(ACCOUNT_ATTRIBUTE))
        .and_then(|(_, values)| values.first())
        .filter(|name| !name.is_empty())
        .cloned()
}

/// An open directory connection, unbound when dropped.
struct Session {
    conn: LdapConn,
}

impl Session {
    fn open(url: &str) -> Result<Self, DirectoryError> {
        let conn = LdapConn::new(url).map_err(DirectoryError::Connect)?;
        Ok(Session { conn })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.conn.unbind() {
            debug!("directory unbind failed: {}", err);
        }
    }
}
