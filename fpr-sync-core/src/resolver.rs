//! Resource Resolver: name pair in, stable identifiers out, creating whatever is missing.
//!
//! Lookups are exact-name and scoped (versions by application id). Zero matches triggers a create with
//! a generated description; one or more matches returns an existing id according to [`NameMatch`].
//! Remote errors propagate unchanged; the caller decides how to isolate them.

use tracing::{info, warn};

use crate::config::NameMatch;
use crate::contract::SscClient;
use crate::error::{Result, SyncError};

pub struct Resolver<'c, C: ?Sized> {
    client: &'c C,
    policy: NameMatch,
}

impl<'c, C> Resolver<'c, C>
where
    C: SscClient + ?Sized,
{
    pub fn new(client: &'c C, policy: NameMatch) -> Self {
        Self { client, policy }
    }

    pub async fn resolve_application(&self, name: &str) -> Result<i64> {
        let matches = self.client.find_applications(name).await?;
        if let Some(id) = self.pick("application", name, matches.iter().map(|a| a.id))? {
            info!(application = %name, application_id = id, "Application already exists");
            return Ok(id);
        }
        let created = self
            .client
            .create_application(name, &description("application", name))
            .await?;
        info!(application = %name, application_id = created.id, "Created application");
        Ok(created.id)
    }

    pub async fn resolve_version(&self, application_id: i64, name: &str) -> Result<i64> {
        let matches = self.client.find_versions(application_id, name).await?;
        if let Some(id) = self.pick("version", name, matches.iter().map(|v| v.id))? {
            info!(application_id, version = %name, version_id = id, "Version already exists");
            return Ok(id);
        }
        let created = self
            .client
            .create_version(application_id, name, &description("version", name))
            .await?;
        info!(application_id, version = %name, version_id = created.id, "Created version");
        Ok(created.id)
    }

    /// Resolves both levels in order; the version lookup is scoped by the resolved application id.
    pub async fn resolve(&self, application: &str, version: &str) -> Result<i64> {
        let application_id = self.resolve_application(application).await?;
        self.resolve_version(application_id, version).await
    }

    fn pick(
        &self,
        kind: &'static str,
        name: &str,
        ids: impl ExactSizeIterator<Item = i64>,
    ) -> Result<Option<i64>> {
        let count = ids.len();
        let mut ids = ids;
        match (count, self.policy) {
            (0, _) => Ok(None),
            (1, _) => Ok(ids.next()),
            (_, NameMatch::First) => {
                let first = ids.next();
                warn!(kind, name, count, chosen_id = ?first, "Several resources share a name, using the first");
                Ok(first)
            }
            (_, NameMatch::Unique) => Err(SyncError::AmbiguousName {
                kind,
                name: name.to_string(),
                count,
            }),
        }
    }
}

fn description(kind: &str, name: &str) -> String {
    format!("{name}: {kind} created automatically by fpr-sync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Application, CommitState, MockSscClient, Version};
    use std::sync::{Arc, Mutex};

    fn version(id: i64, application_id: i64, name: &str) -> Version {
        Version {
            id,
            name: name.to_string(),
            application_id,
            application_name: None,
            commit_state: CommitState::Committed,
        }
    }

    #[tokio::test]
    async fn existing_application_is_reused_without_create() {
        let mut client = MockSscClient::new();
        client.expect_find_applications().returning(|name| {
            Ok(vec![Application {
                id: 7,
                name: name.to_string(),
            }])
        });
        client.expect_create_application().never();

        let resolver = Resolver::new(&client, NameMatch::First);
        assert_eq!(resolver.resolve_application("AppX").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn resolving_twice_creates_once() {
        let store: Arc<Mutex<Vec<Application>>> = Arc::new(Mutex::new(Vec::new()));
        let mut client = MockSscClient::new();
        let lookup = store.clone();
        client.expect_find_applications().returning(move |name| {
            Ok(lookup
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.name == name)
                .cloned()
                .collect())
        });
        let created = store.clone();
        client
            .expect_create_application()
            .times(1)
            .returning(move |name, _| {
                let app = Application {
                    id: 41,
                    name: name.to_string(),
                };
                created.lock().unwrap().push(app.clone());
                Ok(app)
            });

        let resolver = Resolver::new(&client, NameMatch::First);
        let first = resolver.resolve_application("AppX").await.unwrap();
        let second = resolver.resolve_application("AppX").await.unwrap();
        assert_eq!(first, 41);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolving_a_pair_twice_creates_each_resource_once() {
        let apps: Arc<Mutex<Vec<Application>>> = Arc::new(Mutex::new(Vec::new()));
        let versions: Arc<Mutex<Vec<Version>>> = Arc::new(Mutex::new(Vec::new()));
        let mut client = MockSscClient::new();

        let lookup = apps.clone();
        client.expect_find_applications().returning(move |name| {
            Ok(lookup
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.name == name)
                .cloned()
                .collect())
        });
        let created = apps.clone();
        client
            .expect_create_application()
            .times(1)
            .returning(move |name, _| {
                let app = Application {
                    id: 12,
                    name: name.to_string(),
                };
                created.lock().unwrap().push(app.clone());
                Ok(app)
            });
        let lookup = versions.clone();
        client
            .expect_find_versions()
            .returning(move |app_id, name| {
                Ok(lookup
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|v| v.application_id == app_id && v.name == name)
                    .cloned()
                    .collect())
            });
        let created = versions.clone();
        client
            .expect_create_version()
            .withf(|app_id, name, _| *app_id == 12 && name == "3.1")
            .times(1)
            .returning(move |app_id, name, _| {
                let created_version = version(120, app_id, name);
                created.lock().unwrap().push(created_version.clone());
                Ok(created_version)
            });

        let resolver = Resolver::new(&client, NameMatch::First);
        let first = resolver.resolve("AppQ", "3.1").await.unwrap();
        let second = resolver.resolve("AppQ", "3.1").await.unwrap();

        assert_eq!(first, 120);
        assert_eq!(first, second);
        assert_eq!(apps.lock().unwrap().len(), 1);
        assert_eq!(versions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_version_is_created_under_its_application() {
        let mut client = MockSscClient::new();
        client.expect_find_versions().returning(|_, _| Ok(vec![]));
        client
            .expect_create_version()
            .withf(|app_id, name, description| {
                *app_id == 3 && name == "1.0" && description.contains("1.0")
            })
            .times(1)
            .returning(|app_id, name, _| Ok(version(90, app_id, name)));

        let resolver = Resolver::new(&client, NameMatch::First);
        assert_eq!(resolver.resolve_version(3, "1.0").await.unwrap(), 90);
    }

    #[tokio::test]
    async fn first_match_wins_by_default() {
        let mut client = MockSscClient::new();
        client
            .expect_find_versions()
            .returning(|app_id, name| Ok(vec![version(5, app_id, name), version(6, app_id, name)]));

        let resolver = Resolver::new(&client, NameMatch::First);
        assert_eq!(resolver.resolve_version(1, "2.0").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unique_policy_rejects_ambiguous_names() {
        let mut client = MockSscClient::new();
        client.expect_find_applications().returning(|name| {
            Ok(vec![
                Application {
                    id: 1,
                    name: name.to_string(),
                },
                Application {
                    id: 2,
                    name: name.to_string(),
                },
            ])
        });
        client.expect_create_application().never();

        let resolver = Resolver::new(&client, NameMatch::Unique);
        let err = resolver.resolve_application("Dup").await.unwrap_err();
        assert!(matches!(err, SyncError::AmbiguousName { count: 2, .. }));
    }

    #[tokio::test]
    async fn lookup_failure_propagates_without_create() {
        let mut client = MockSscClient::new();
        client.expect_find_applications().returning(|_| {
            Err(SyncError::Status {
                endpoint: "/api/v1/projects".into(),
                status: 500,
            })
        });
        client.expect_create_application().never();

        let resolver = Resolver::new(&client, NameMatch::First);
        let err = resolver.resolve("AppX", "1.0").await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 500, .. }));
    }
}
