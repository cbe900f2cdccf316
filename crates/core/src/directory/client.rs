//! LDAP directory fetcher.
//!
//! Each [`LdapDirectory::fetch`] opens a fresh connection, binds, runs the
//! user and group searches and unbinds. Nothing is kept between cycles.
//! `timeout_secs` bounds the connect and every operation on the connection.

use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use super::entry::{DirectoryEntry, DirectorySnapshot};
use crate::config::{LdapConfig, MappingConfig};
use crate::errors::DirectoryError;

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        DirectoryEntry {
            dn: entry.dn,
            attrs: entry.attrs.into_iter().collect(),
        }
    }
}

/// Fetches user and group entries from an LDAP server.
pub struct LdapDirectory {
    config: LdapConfig,
    user_attrs: Vec<String>,
    group_attrs: Vec<String>,
}

impl LdapDirectory {
    /// Create a fetcher requesting the attributes `mapping` reads.
    ///
    /// This does not connect; a connection is opened per [`fetch`](Self::fetch).
    pub fn new(config: &LdapConfig, mapping: &MappingConfig) -> Self {
        Self {
            config: config.clone(),
            user_attrs: mapping.user_search_attrs(),
            group_attrs: mapping.group_search_attrs(),
        }
    }

    /// Run both searches and return the materialized results.
    pub async fn fetch(&self) -> Result<DirectorySnapshot, DirectoryError> {
        let mut ldap = self.connect().await?;

        let users = self
            .search(
                &mut ldap,
                &self.config.user_base_dn,
                &self.config.user_filter,
                &self.user_attrs,
            )
            .await;
        let groups = if users.is_ok() {
            self.search(
                &mut ldap,
                &self.config.group_base_dn,
                &self.config.group_filter,
                &self.group_attrs,
            )
            .await
        } else {
            Ok(Vec::new())
        };

        if let Err(e) = ldap.with_timeout(self.timeout()).unbind().await {
            warn!(error = %e, "error during LDAP unbind");
        }

        let snapshot = DirectorySnapshot {
            users: users?,
            groups: groups?,
        };
        info!(
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            "fetched directory entries"
        );
        Ok(snapshot)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let url = &self.config.url;
        debug!(url = %url, starttls = self.config.starttls, "connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout())
            .set_starttls(self.config.starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(|e| DirectoryError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        if bind_dn.is_empty() {
            debug!("using anonymous LDAP access");
            return Ok(ldap);
        }

        let password = self.config.bind_password.as_deref().unwrap_or("");
        ldap.with_timeout(self.timeout())
            .simple_bind(bind_dn, password)
            .await
            .and_then(|result| result.success())
            .map_err(|e| DirectoryError::Bind {
                bind_dn: bind_dn.clone(),
                detail: e.to_string(),
            })?;

        debug!(bind_dn = %bind_dn, "LDAP bind succeeded");
        Ok(ldap)
    }

    async fn search(
        &self,
        ldap: &mut Ldap,
        base_dn: &str,
        filter: &str,
        attrs: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!(base_dn, filter, ?attrs, "searching directory");

        let (entries, _result) = ldap
            .with_timeout(self.timeout())
            .search(base_dn, Scope::Subtree, filter, attrs.to_vec())
            .await
            .and_then(|result| result.success())
            .map_err(|e| DirectoryError::Search {
                base_dn: base_dn.to_string(),
                detail: e.to_string(),
            })?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_search_entry_conversion() {
        let entry = SearchEntry {
            dn: "uid=alice,ou=People,dc=example,dc=com".into(),
            attrs: HashMap::from([
                ("uid".to_string(), vec!["alice".to_string()]),
                ("gidNumber".to_string(), vec!["100".to_string()]),
            ]),
            bin_attrs: HashMap::new(),
        };

        let entry = DirectoryEntry::from(entry);
        assert_eq!(entry.dn, "uid=alice,ou=People,dc=example,dc=com");
        assert_eq!(entry.value("uid"), "alice");
        assert_eq!(entry.value("gidnumber"), "100");
    }

    #[test]
    fn test_requested_attributes() {
        let config: LdapConfig = toml::from_str(
            r#"
url = "ldap://localhost"
user_base_dn = "ou=People,dc=x"
group_base_dn = "ou=Groups,dc=x"
"#,
        )
        .unwrap();
        let directory = LdapDirectory::new(&config, &MappingConfig::default());
        assert_eq!(directory.user_attrs, vec!["gidNumber", "uid"]);
        assert_eq!(directory.group_attrs, vec!["cn", "gidNumber", "memberUid"]);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let config: LdapConfig = toml::from_str(
            r#"
url = "ldap://127.0.0.1:1"
timeout_secs = 1
user_base_dn = "ou=People,dc=x"
group_base_dn = "ou=Groups,dc=x"
"#,
        )
        .unwrap();
        let directory = LdapDirectory::new(&config, &MappingConfig::default());
        let result = directory.fetch().await;
        assert!(matches!(result, Err(DirectoryError::Connect { .. })));
    }

    /// Accepts TCP connections (via the listen backlog) but never answers.
    async fn silent_server() -> tokio::net::TcpListener {
        tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap()
    }

    fn config_for(listener: &tokio::net::TcpListener, bind_dn: &str) -> LdapConfig {
        let port = listener.local_addr().unwrap().port();
        let mut config: LdapConfig = toml::from_str(&format!(
            r#"
url = "ldap://127.0.0.1:{port}"
timeout_secs = 1
user_base_dn = "ou=People,dc=x"
group_base_dn = "ou=Groups,dc=x"
"#
        ))
        .unwrap();
        config.bind_dn = bind_dn.to_string();
        config.bind_password = Some("secret".into());
        config
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out_search() {
        let listener = silent_server().await;
        let directory = LdapDirectory::new(&config_for(&listener, ""), &MappingConfig::default());

        let result = tokio::time::timeout(Duration::from_secs(10), directory.fetch())
            .await
            .expect("fetch hung past the operation timeout");
        match result {
            Err(DirectoryError::Search { base_dn, .. }) => assert_eq!(base_dn, "ou=People,dc=x"),
            other => panic!("expected search error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out_bind() {
        let listener = silent_server().await;
        let directory = LdapDirectory::new(
            &config_for(&listener, "cn=reader,dc=x"),
            &MappingConfig::default(),
        );

        let result = tokio::time::timeout(Duration::from_secs(10), directory.fetch())
            .await
            .expect("fetch hung past the operation timeout");
        assert!(matches!(result, Err(DirectoryError::Bind { .. })));
    }
}
