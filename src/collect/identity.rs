//! Maps broker-side identifiers onto internal entities.

use crate::constants::BrokerType;
use crate::database::FeasibilityRepository;
use crate::error::{CollectError, CollectResult, PersistenceError};
use crate::models::{Query, Site};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct IdentityResolver {
    repository: Arc<dyn FeasibilityRepository>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(repository: Arc<dyn FeasibilityRepository>) -> Self {
        Self { repository }
    }

    /// Internal query a broker query was dispatched for.
    ///
    /// An update for a query this instance never dispatched is an
    /// [`CollectError::IdentityResolution`] error.
    pub async fn resolve_query(
        &self,
        broker_query_id: &str,
        broker_type: BrokerType,
    ) -> CollectResult<Query> {
        self.repository
            .find_dispatch_by_external_id_and_broker_type(broker_query_id, broker_type)
            .await?
            .map(|dispatch| dispatch.query)
            .ok_or_else(|| CollectError::identity_resolution(broker_query_id, broker_type))
    }

    /// Site with the given name, created on first sight.
    ///
    /// When a concurrent first sighting wins the insert, the loser reads the
    /// winner's row instead of failing.
    pub async fn resolve_or_create_site(&self, site_name: &str) -> CollectResult<Site> {
        if let Some(site) = self.repository.find_site_by_name(site_name).await? {
            return Ok(site);
        }

        match self.repository.save_site(site_name).await {
            Ok(site) => {
                debug!(site_id = site.id, site_name = %site.site_name, "Created site on first sight");
                Ok(site)
            }
            Err(PersistenceError::DuplicateSite { .. }) => {
                debug!(site_name = %site_name, "Lost site creation race, reading existing site");
                self.repository
                    .find_site_by_name(site_name)
                    .await?
                    .ok_or_else(|| {
                        PersistenceError::database(
                            "resolve_or_create_site",
                            format!("site '{site_name}' reported as duplicate but not found"),
                        )
                        .into()
                    })
            }
            Err(e) => Err(e.into()),
        }
    }
}
