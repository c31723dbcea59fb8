//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use circulation_server::{
    error::AppResult,
    models::{
        borrower::CreateBorrower,
        loan::{IssueRequest, ReturnRequest},
        title::{AddCopiesOutcome, AddCopiesRequest, ShelfLocation},
        Borrower, LoanPolicy, Title,
    },
    repository::{LibraryStore, MemoryStore},
    services::{
        notifications::{Mailer, NotificationWorker, Notifier},
        Services,
    },
};

/// Mail sent through the worker: (to, subject)
pub type Outbox = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Outbox,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub services: Services,
    pub worker: NotificationWorker,
    pub outbox: Outbox,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(LoanPolicy::default())
    }

    pub fn with_policy(policy: LoanPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = RecordingMailer::default();
        let outbox = mailer.sent.clone();
        let (notifier, worker) = Notifier::channel(Arc::new(mailer));
        let services = Services::new(store.clone(), policy, notifier);
        Self {
            store,
            services,
            worker,
            outbox,
        }
    }

    /// Deliver queued notifications and return everything sent so far
    pub async fn sent_mail(&mut self) -> Vec<(String, String)> {
        self.worker.flush().await;
        self.outbox.lock().unwrap().clone()
    }

    pub async fn add_title(&self, isbn: &str, title: &str, author: &str, copies: &[&str]) -> Title {
        match self
            .services
            .catalog
            .add_copies_at(&add_request(isbn, title, author, copies, false), day(0))
            .await
            .expect("add title")
        {
            AddCopiesOutcome::Created { title } => title,
            other => panic!("expected a new title, got {other:?}"),
        }
    }

    pub async fn register(&self, id: &str, department: Option<&str>) -> Borrower {
        self.services
            .borrowers
            .register(
                CreateBorrower {
                    id: id.to_string(),
                    name: format!("Student {id}"),
                    email: format!("{}@example.edu", id.to_lowercase()),
                    department: department.map(str::to_string),
                    semester: Some("4".to_string()),
                    phone: None,
                },
                day(0),
            )
            .await
            .expect("register borrower")
    }

    pub async fn title(&self, isbn: &str) -> Title {
        self.store
            .get_title(isbn)
            .await
            .unwrap()
            .expect("title exists")
    }

    pub async fn borrower(&self, id: &str) -> Borrower {
        self.store
            .get_borrower(id)
            .await
            .unwrap()
            .expect("borrower exists")
    }

    /// Every title is a disjoint union and every borrower projection
    /// matches the loan ledger.
    pub async fn assert_consistent(&self) {
        for title in self.store.list_titles().await.unwrap() {
            assert!(title.is_consistent(), "inconsistent copy sets: {title:?}");
        }

        let loans = self.store.list_loans().await.unwrap();
        for borrower in self.store.list_borrowers().await.unwrap() {
            let mut held: Vec<&String> = borrower.borrowed_copies.keys().collect();
            let mut ledger: Vec<&String> = loans
                .iter()
                .filter(|l| l.borrower_id == borrower.id)
                .map(|l| &l.copy_number)
                .collect();
            held.sort();
            ledger.sort();
            assert_eq!(held, ledger, "borrower {} diverged from ledger", borrower.id);
        }

        for loan in &loans {
            let title = self.title(&loan.isbn).await;
            assert!(title.issued_copies.contains(&loan.copy_number));
        }
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::days(n)
}

pub fn add_request(
    isbn: &str,
    title: &str,
    author: &str,
    copies: &[&str],
    confirmed: bool,
) -> AddCopiesRequest {
    AddCopiesRequest {
        isbn: isbn.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        edition: Some(1),
        publisher: Some("Campus Press".to_string()),
        year: Some(2020),
        copy_numbers: copies.iter().map(|c| c.to_string()).collect(),
        branches: vec!["cse".to_string()],
        location: ShelfLocation {
            shelf: "A".to_string(),
            row: "2".to_string(),
        },
        tags: vec!["textbook".to_string()],
        image_url: format!("https://covers.example.edu/{isbn}.jpg"),
        confirmed,
    }
}

pub fn issue(borrower_id: &str, copy_number: &str, isbn: &str) -> IssueRequest {
    IssueRequest {
        borrower_id: borrower_id.to_string(),
        copy_number: copy_number.to_string(),
        isbn: isbn.to_string(),
    }
}

pub fn give_back(borrower_id: &str, copy_number: &str) -> ReturnRequest {
    ReturnRequest {
        borrower_id: borrower_id.to_string(),
        copy_number: copy_number.to_string(),
    }
}
