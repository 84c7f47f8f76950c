//! Business logic services

pub mod authors;
pub mod catalog;
pub mod members;
pub mod reservations;

use crate::{config::ReservationsConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub authors: authors::AuthorsService,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub reservations: reservations::ReservationsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, reservations_config: &ReservationsConfig) -> Self {
        Self {
            authors: authors::AuthorsService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            reservations: reservations::ReservationsService::new(repository.clone(), reservations_config),
            repository,
        }
    }

    /// Database reachability, used by the readiness probe
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
