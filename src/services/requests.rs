//! Book request tally

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        request::{normalize_key, BookRequestView, CreateBookRequest},
        BookRequest, Title,
    },
    repository::Repository,
};

use super::notifications::{Notification, Notifier};

#[derive(Clone)]
pub struct RequestsService {
    repository: Repository,
    notifier: Notifier,
}

impl RequestsService {
    pub fn new(repository: Repository, notifier: Notifier) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Count a request for a title that cannot be borrowed right now
    pub async fn submit(
        &self,
        request: &CreateBookRequest,
        requester: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BookRequest> {
        let title = normalize_key(&request.title);
        let author = normalize_key(&request.author);
        if title.is_empty() || author.is_empty() {
            return Err(AppError::Validation(
                "Title and author are required".to_string(),
            ));
        }

        if let Some(existing) = self.repository.find_title(&title, &author).await? {
            if !existing.available_copies.is_empty() {
                return Err(AppError::Conflict(format!(
                    "\"{}\" is available to borrow",
                    existing.title
                )));
            }
        }

        let recorded = self
            .repository
            .record_request(&title, &author, requester, now)
            .await?;
        tracing::info!(
            "Book request for \"{}\" by {} now at {}",
            recorded.title,
            recorded.author,
            recorded.count
        );
        Ok(recorded)
    }

    /// Tally rows, most requested first, with cover and branches when catalogued
    pub async fn list(&self) -> AppResult<Vec<BookRequestView>> {
        let requests = self.repository.list_requests().await?;
        let mut views = Vec::with_capacity(requests.len());

        for request in requests {
            let title = self
                .repository
                .find_title(&request.title, &request.author)
                .await?;
            let (image_url, branches) = title
                .map(|t| (t.image_url, t.branches))
                .unwrap_or_default();

            views.push(BookRequestView {
                id: request.id,
                title: request.title,
                author: request.author,
                count: request.count,
                image_url,
                branches,
            });
        }

        Ok(views)
    }

    pub async fn clear(&self) -> AppResult<u64> {
        let cleared = self.repository.clear_requests().await?;
        tracing::info!("Cleared {} book requests", cleared);
        Ok(cleared)
    }

    /// Notify everyone who asked for `title` once it has available copies,
    /// then drop the tally row. Returns the number of notifications queued.
    pub async fn fulfil(&self, title: &Title) -> AppResult<usize> {
        if title.available_copies.is_empty() {
            return Ok(0);
        }

        let Some(request) = self
            .repository
            .take_request(&normalize_key(&title.title), &normalize_key(&title.author))
            .await?
        else {
            return Ok(0);
        };

        // The row is already gone, so a failed lookup must not skip later requesters
        let mut notified = 0;
        for requester in &request.requested_by {
            let borrower = match self.repository.get_borrower(requester).await {
                Ok(borrower) => borrower,
                Err(e) => {
                    tracing::warn!("Could not look up requester {}: {}", requester, e);
                    continue;
                }
            };
            match borrower {
                Some(borrower) if !borrower.email.is_empty() => {
                    self.notifier.enqueue(Notification::TitleAvailable {
                        to: borrower.email,
                        name: borrower.name,
                        title: title.title.clone(),
                        author: title.author.clone(),
                    });
                    notified += 1;
                }
                _ => tracing::debug!("Requester {} has no email on record", requester),
            }
        }

        tracing::info!(
            "Resolved request for \"{}\": {} of {} requesters notified",
            title.title,
            notified,
            request.requested_by.len()
        );
        Ok(notified)
    }

    /// `fulfil` for callers whose own operation has already committed
    pub async fn resolve_quietly(&self, title: &Title) {
        if let Err(e) = self.fulfil(title).await {
            tracing::warn!("Failed to resolve requests for {}: {}", title.isbn, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{
        models::{
            borrower::CreateBorrower,
            title::{AddCopiesRequest, ShelfLocation},
        },
        repository::MockLibraryStore,
        services::notifications::MockMailer,
    };

    fn shelved_title() -> Title {
        Title::from_request(
            &AddCopiesRequest {
                isbn: "978-1".into(),
                title: "Compilers".into(),
                author: "Aho".into(),
                edition: None,
                publisher: None,
                year: None,
                copy_numbers: vec!["BN2-01".into()],
                branches: vec![],
                location: ShelfLocation::default(),
                tags: vec![],
                image_url: "https://img.example/compilers.jpg".into(),
                confirmed: false,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn failed_requester_lookup_does_not_skip_the_rest() {
        let now = Utc::now();
        let mut store = MockLibraryStore::new();
        store
            .expect_take_request()
            .withf(|title, author| title.eq("compilers") && author.eq("aho"))
            .times(1)
            .returning(move |title, author| {
                let mut request = BookRequest::new(title, author, "S1", now);
                request.add_requester("S2", now);
                Ok(Some(request))
            });
        store
            .expect_get_borrower()
            .withf(|id| id.eq("S1"))
            .times(1)
            .returning(|_| Err(AppError::Internal("connection reset".into())));
        store
            .expect_get_borrower()
            .withf(|id| id.eq("S2"))
            .times(1)
            .returning(move |_| {
                Ok(Some(
                    CreateBorrower {
                        id: "S2".into(),
                        name: "Ravi".into(),
                        email: "ravi@example.edu".into(),
                        department: None,
                        semester: None,
                        phone: None,
                    }
                    .into_borrower(now),
                ))
            });

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, _| {
                to.eq("ravi@example.edu") && subject.eq("Now available: Compilers")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (notifier, mut worker) = Notifier::channel(Arc::new(mailer));
        let requests = RequestsService::new(Arc::new(store), notifier);

        let notified = requests.fulfil(&shelved_title()).await.unwrap();
        assert_eq!(notified, 1);
        assert_eq!(worker.flush().await, 1);
    }

    #[tokio::test]
    async fn nothing_is_taken_while_no_copy_is_available() {
        let mut title = shelved_title();
        title.check_out("BN2-01").unwrap();

        // No expectations: any store call would panic
        let store = MockLibraryStore::new();
        let (notifier, _worker) = Notifier::channel(Arc::new(MockMailer::new()));
        let requests = RequestsService::new(Arc::new(store), notifier);

        assert_eq!(requests.fulfil(&title).await.unwrap(), 0);
    }
}
