//! Catalog management service

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        title::{AddCopiesOutcome, AddCopiesRequest, CopyRemoval, DeleteCopiesRequest, TitleView},
        Title,
    },
    repository::Repository,
};

use super::requests::RequestsService;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    requests: RequestsService,
}

impl CatalogService {
    pub fn new(repository: Repository, requests: RequestsService) -> Self {
        Self {
            repository,
            requests,
        }
    }

    /// All titles with their derived status
    pub async fn list(&self) -> AppResult<Vec<TitleView>> {
        let titles = self.repository.list_titles().await?;
        Ok(titles.into_iter().map(TitleView::from).collect())
    }

    pub async fn get(&self, isbn: &str) -> AppResult<Title> {
        self.repository
            .get_title(isbn.trim())
            .await?
            .ok_or_else(|| AppError::title_not_found(isbn))
    }

    pub async fn add_copies(&self, request: &AddCopiesRequest) -> AppResult<AddCopiesOutcome> {
        self.add_copies_at(request, Utc::now()).await
    }

    /// Create a title or, once the operator confirms, merge new copy numbers
    /// into an existing one. An unconfirmed duplicate ISBN writes nothing.
    pub async fn add_copies_at(
        &self,
        request: &AddCopiesRequest,
        now: DateTime<Utc>,
    ) -> AppResult<AddCopiesOutcome> {
        let title = Title::from_request(request, now);
        if title.all_copies.is_empty() {
            return Err(AppError::Validation(
                "At least one copy number is required".to_string(),
            ));
        }

        let existing = match self.repository.get_title(&title.isbn).await? {
            Some(existing) => existing,
            None => match self.repository.create_title(&title).await {
                Ok(()) => {
                    tracing::info!(
                        "Catalogued {} ({}) with {} copies",
                        title.isbn,
                        title.title,
                        title.all_copies.len()
                    );
                    self.requests.resolve_quietly(&title).await;
                    return Ok(AddCopiesOutcome::Created { title });
                }
                // created concurrently: fall through to the duplicate handling
                Err(AppError::Conflict(_)) => self
                    .repository
                    .get_title(&title.isbn)
                    .await?
                    .ok_or_else(|| AppError::title_not_found(&title.isbn))?,
                Err(e) => return Err(e),
            },
        };

        if !request.confirmed {
            tracing::debug!("ISBN {} already catalogued, awaiting confirmation", existing.isbn);
            return Ok(AddCopiesOutcome::Duplicate {
                existing_title: existing,
            });
        }

        let copies: Vec<String> = title.all_copies.into_iter().collect();
        let (merged, added) = self
            .repository
            .merge_copies(&existing.isbn, &copies, now)
            .await?;

        tracing::info!(
            "Merged {} new copies into {} ({} requested)",
            added.len(),
            merged.isbn,
            copies.len()
        );
        self.requests.resolve_quietly(&merged).await;

        Ok(AddCopiesOutcome::Merged {
            title: merged,
            added,
        })
    }

    /// Remove copies or the whole title. Issued copies are never removed.
    pub async fn delete(
        &self,
        request: &DeleteCopiesRequest,
        now: DateTime<Utc>,
    ) -> AppResult<CopyRemoval> {
        let selection = request.selection()?;
        let outcome = self
            .repository
            .remove_copies(request.isbn.trim(), &selection, now)
            .await?;

        match &outcome {
            CopyRemoval::TitleDeleted { isbn, removed } => {
                tracing::info!("Deleted title {} with its {} copies", isbn, removed.len())
            }
            CopyRemoval::CopiesRemoved { title, removed } => tracing::info!(
                "Removed copies {:?} from {}, {} remain",
                removed,
                title.isbn,
                title.all_copies.len()
            ),
        }

        Ok(outcome)
    }
}
