//! Book catalog service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{normalize_isbn, Book, BookQuery, CreateBook, UpdateBook},
        reservation::ReservationDetails,
    },
    repository::{reservations::ReservationFilter, Repository, Visibility},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, mut query: BookQuery) -> AppResult<Vec<Book>> {
        query.isbn = query.isbn.as_deref().map(normalize_isbn);
        self.repository.books_list(&query).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.repository.books_get_by_id(id, Visibility::Active).await
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        self.repository.books_get_by_isbn(&normalize_isbn(isbn), Visibility::Active).await
    }

    /// Create a book; the ISBN must be new and every author active
    pub async fn create(&self, mut data: CreateBook) -> AppResult<Book> {
        data.isbn = normalize_isbn(&data.isbn);

        if self.repository.books_isbn_exists(&data.isbn, None).await? {
            return Err(AppError::Conflict(format!("ISBN {} is already registered", data.isbn)));
        }
        self.ensure_authors(&data.author_ids).await?;

        let book = self.repository.books_create(&data).await?;
        tracing::info!("Book {} created: {} ({} copies)", book.id, book.isbn, book.available_copies);
        Ok(book)
    }

    pub async fn update(&self, id: i32, mut data: UpdateBook) -> AppResult<Book> {
        if let Some(isbn) = data.isbn.take() {
            let isbn = normalize_isbn(&isbn);
            if self.repository.books_isbn_exists(&isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!("ISBN {} is already registered", isbn)));
            }
            data.isbn = Some(isbn);
        }
        if let Some(ref author_ids) = data.author_ids {
            self.ensure_authors(author_ids).await?;
        }

        self.repository.books_update(id, &data).await
    }

    /// Logical delete; copies and reservations are left as they are
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.books_deactivate(id).await?;
        tracing::info!("Book {} deactivated", id);
        Ok(())
    }

    /// Reservations of an active book
    pub async fn reservations(&self, id: i32, include_inactive: Option<bool>) -> AppResult<Vec<ReservationDetails>> {
        if !self.repository.books_exists_active(id).await? {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        let filter = ReservationFilter {
            book_id: Some(id),
            visibility: Visibility::from_flag(include_inactive),
            ..Default::default()
        };
        self.repository.reservations_list(&filter).await
    }

    async fn ensure_authors(&self, author_ids: &[i32]) -> AppResult<()> {
        let missing = self.repository.authors_missing_active(author_ids).await?;
        if missing.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
        Err(AppError::NotFound(format!("Author(s) not found: {}", ids.join(", "))))
    }
}
