//! Book catalog methods on Repository

use chrono::Utc;
use sqlx::{PgConnection, Row};

use super::{where_clause, Repository, Visibility};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorShort,
        book::{Book, BookQuery, CreateBook, UpdateBook},
        reservation::BookRef,
    },
};

impl Repository {
    /// List books with optional filters
    pub async fn books_list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.title.is_some() {
            conditions.push(format!("LOWER(b.title) LIKE ${}", idx));
            idx += 1;
        }
        if query.isbn.is_some() {
            conditions.push(format!("b.isbn = ${}", idx));
            idx += 1;
        }
        if query.author_id.is_some() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM book_authors ba WHERE ba.book_id = b.id AND ba.author_id = ${})",
                idx
            ));
        }

        let select_query = format!(
            "SELECT b.* FROM books b {} ORDER BY b.title",
            where_clause(Visibility::from_flag(query.include_inactive), "b", &conditions)
        );

        let title_pattern = query.title.as_ref().map(|t| format!("%{}%", t.to_lowercase()));

        let mut builder = sqlx::query_as::<_, Book>(&select_query);
        if let Some(ref pattern) = title_pattern {
            builder = builder.bind(pattern);
        }
        if let Some(ref isbn) = query.isbn {
            builder = builder.bind(isbn);
        }
        if let Some(author_id) = query.author_id {
            builder = builder.bind(author_id);
        }

        let mut books = builder.fetch_all(&self.pool).await?;
        self.books_load_authors(&mut books).await?;
        Ok(books)
    }

    /// Active books linked to an author
    pub async fn books_by_author(&self, author_id: i32) -> AppResult<Vec<Book>> {
        let mut books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.* FROM books b
            JOIN book_authors ba ON ba.book_id = b.id
            WHERE ba.author_id = $1 AND b.active = TRUE
            ORDER BY b.title
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        self.books_load_authors(&mut books).await?;
        Ok(books)
    }

    /// Get book by ID
    pub async fn books_get_by_id(&self, id: i32, visibility: Visibility) -> AppResult<Book> {
        let query = format!(
            "SELECT b.* FROM books b WHERE b.id = $1 AND {}",
            visibility.predicate("b")
        );

        let book = sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        self.books_with_authors(book).await
    }

    /// Get book by ISBN
    pub async fn books_get_by_isbn(&self, isbn: &str, visibility: Visibility) -> AppResult<Book> {
        let query = format!(
            "SELECT b.* FROM books b WHERE b.isbn = $1 AND {}",
            visibility.predicate("b")
        );

        let book = sqlx::query_as::<_, Book>(&query)
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ISBN {} not found", isbn)))?;

        self.books_with_authors(book).await
    }

    /// Whether the book exists and is active
    pub async fn books_exists_active(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = $1 AND active = TRUE)"
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if an ISBN is already used by another book (active or not)
    pub async fn books_isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id != $2))"
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a book and its author links
    pub async fn books_create(&self, data: &CreateBook) -> AppResult<Book> {
        let mut tx = self.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO books (title, isbn, publication_year, genre, available_copies)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(&data.isbn)
        .bind(data.publication_year)
        .bind(&data.genre)
        .bind(data.available_copies)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("ISBN {} is already registered", data.isbn)))?;

        self.books_link_authors(&mut tx, id, &data.author_ids).await?;

        tx.commit().await?;
        self.books_get_by_id(id, Visibility::All).await
    }

    /// Update a book. `author_ids`, when present, replaces the author set.
    pub async fn books_update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.title, "title");
        add_field!(data.isbn, "isbn");
        add_field!(data.publication_year, "publication_year");
        add_field!(data.genre, "genre");
        add_field!(data.available_copies, "available_copies");
        add_field!(data.active, "active");

        let query = format!("UPDATE books SET {} WHERE id = ${}", sets.join(", "), idx);

        let mut builder = sqlx::query(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.title);
        bind_field!(data.isbn);
        bind_field!(data.publication_year);
        bind_field!(data.genre);
        bind_field!(data.available_copies);
        bind_field!(data.active);

        let mut tx = self.begin().await?;

        let result = builder
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::unique_violation(e, "ISBN is already registered"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        if let Some(ref author_ids) = data.author_ids {
            sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            self.books_link_authors(&mut tx, id, author_ids).await?;
        }

        tx.commit().await?;
        self.books_get_by_id(id, Visibility::All).await
    }

    /// Logical delete. The copy count is left untouched.
    pub async fn books_deactivate(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET active = FALSE, updated_at = $1 WHERE id = $2 AND active = TRUE"
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactional helpers used by the reservation engine
    // -----------------------------------------------------------------------

    /// Load and lock a book row for the rest of the transaction
    pub async fn books_find_for_update(
        &self,
        conn: &mut PgConnection,
        book: &BookRef,
        visibility: Visibility,
    ) -> AppResult<Option<Book>> {
        let found = match book {
            BookRef::Id(id) => {
                let query = format!(
                    "SELECT b.* FROM books b WHERE b.id = $1 AND {} FOR UPDATE",
                    visibility.predicate("b")
                );
                sqlx::query_as::<_, Book>(&query)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            BookRef::Isbn(isbn) => {
                let query = format!(
                    "SELECT b.* FROM books b WHERE b.isbn = $1 AND {} FOR UPDATE",
                    visibility.predicate("b")
                );
                sqlx::query_as::<_, Book>(&query)
                    .bind(isbn)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };
        Ok(found)
    }

    /// Take one copy. Never goes below zero: fails when none is left.
    pub async fn books_decrement_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Conflict("No copies available".to_string()))
    }

    /// Give one copy back, whether or not the book is still active
    pub async fn books_increment_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn books_set_active(&self, conn: &mut PgConnection, id: i32, active: bool) -> AppResult<()> {
        sqlx::query("UPDATE books SET active = $1, updated_at = NOW() WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Author links
    // -----------------------------------------------------------------------

    async fn books_link_authors(&self, conn: &mut PgConnection, book_id: i32, author_ids: &[i32]) -> AppResult<()> {
        if author_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO book_authors (book_id, author_id)
            SELECT $1, UNNEST($2::int[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(book_id)
        .bind(author_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn books_with_authors(&self, book: Book) -> AppResult<Book> {
        let mut books = vec![book];
        self.books_load_authors(&mut books).await?;
        books
            .pop()
            .ok_or_else(|| AppError::Internal("book vanished while loading authors".to_string()))
    }

    /// Fill `authors` for every book in one query
    async fn books_load_authors(&self, books: &mut [Book]) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }

        let ids: Vec<i32> = books.iter().map(|b| b.id).collect();

        let rows = sqlx::query(
            r#"
            SELECT ba.book_id, a.id, a.name
            FROM book_authors ba
            JOIN authors a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY a.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let book_id: i32 = row.get("book_id");
            if let Some(book) = books.iter_mut().find(|b| b.id == book_id) {
                book.authors.push(AuthorShort {
                    id: row.get("id"),
                    name: row.get("name"),
                });
            }
        }

        Ok(())
    }
}
