//! Author registry service

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::Book,
    },
    repository::{Repository, Visibility},
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
}

impl AuthorsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &AuthorQuery) -> AppResult<Vec<Author>> {
        self.repository.authors_list(query).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        self.repository.authors_get_by_id(id, Visibility::Active).await
    }

    /// Create an author; names are unique among active authors
    pub async fn create(&self, mut data: CreateAuthor) -> AppResult<Author> {
        data.name = data.name.trim().to_string();

        if self.repository.authors_name_taken(&data.name, None).await? {
            return Err(AppError::Conflict(format!("Author '{}' already exists", data.name)));
        }

        let author = self.repository.authors_create(&data).await?;
        tracing::info!("Author {} created: {}", author.id, author.name);
        Ok(author)
    }

    pub async fn update(&self, id: i32, mut data: UpdateAuthor) -> AppResult<Author> {
        self.repository.authors_get_by_id(id, Visibility::Active).await?;

        if let Some(name) = data.name.take() {
            let name = name.trim().to_string();
            if self.repository.authors_name_taken(&name, Some(id)).await? {
                return Err(AppError::Conflict(format!("Author '{}' already exists", name)));
            }
            data.name = Some(name);
        }

        self.repository.authors_update(id, &data).await
    }

    /// Deactivate an author and unlink it from all of its books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let unlinked = self.repository.authors_deactivate(id).await?;
        tracing::info!("Author {} deactivated, unlinked from {} book(s)", id, unlinked);
        Ok(())
    }

    /// Active books written by an active author
    pub async fn books(&self, id: i32) -> AppResult<Vec<Book>> {
        self.repository.authors_get_by_id(id, Visibility::Active).await?;
        self.repository.books_by_author(id).await
    }
}
