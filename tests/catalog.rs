//! Catalog maintenance, book requests, feedback and broadcasts

mod common;

use std::collections::BTreeSet;

use chrono::Duration;

use circulation_server::{
    error::{AppError, Entity},
    models::{
        feedback::{CreateFeedback, FeedbackRange},
        request::CreateBookRequest,
        title::{AddCopiesOutcome, CopyRemoval, DeleteCopiesRequest},
    },
    repository::LibraryStore,
};

use common::{add_request, day, give_back, issue, Harness};

fn set(copies: &[&str]) -> BTreeSet<String> {
    copies.iter().map(|c| c.to_string()).collect()
}

fn delete_all(isbn: &str) -> DeleteCopiesRequest {
    DeleteCopiesRequest {
        isbn: isbn.to_string(),
        all: true,
        copy_numbers: vec![],
    }
}

fn delete_some(isbn: &str, copies: &[&str]) -> DeleteCopiesRequest {
    DeleteCopiesRequest {
        isbn: isbn.to_string(),
        all: false,
        copy_numbers: copies.iter().map(|c| c.to_string()).collect(),
    }
}

fn book_request(title: &str, author: &str) -> CreateBookRequest {
    CreateBookRequest {
        title: title.to_string(),
        author: author.to_string(),
        borrower_id: None,
    }
}

#[tokio::test]
async fn duplicate_isbn_needs_confirmation_before_merging() {
    let h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01", "BN1-02"])
        .await;

    let outcome = h
        .services
        .catalog
        .add_copies_at(
            &add_request("978-0", "Operating Systems", "Silberschatz", &["BN1-03"], false),
            day(1),
        )
        .await
        .unwrap();
    match outcome {
        AddCopiesOutcome::Duplicate { existing_title } => {
            assert_eq!(existing_title.all_copies, set(&["BN1-01", "BN1-02"]))
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(h.title("978-0").await.all_copies, set(&["BN1-01", "BN1-02"]));

    let outcome = h
        .services
        .catalog
        .add_copies_at(
            &add_request(
                "978-0",
                "Operating Systems",
                "Silberschatz",
                &["BN1-02", "BN1-03", "BN1-03"],
                true,
            ),
            day(1),
        )
        .await
        .unwrap();
    match outcome {
        AddCopiesOutcome::Merged { title, added } => {
            assert_eq!(added, vec!["BN1-03".to_string()]);
            assert_eq!(title.all_copies, set(&["BN1-01", "BN1-02", "BN1-03"]));
            assert_eq!(title.available_copies, title.all_copies);
        }
        other => panic!("expected merge, got {other:?}"),
    }
    h.assert_consistent().await;
}

#[tokio::test]
async fn merging_leaves_issued_copies_issued() {
    let h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01"])
        .await;
    h.register("S1", None).await;
    h.services
        .loans
        .issue_at(&issue("S1", "BN1-01", "978-0"), day(0))
        .await
        .unwrap();

    h.services
        .catalog
        .add_copies_at(
            &add_request("978-0", "Operating Systems", "Silberschatz", &["BN1-01", "BN1-02"], true),
            day(1),
        )
        .await
        .unwrap();

    let title = h.title("978-0").await;
    assert_eq!(title.issued_copies, set(&["BN1-01"]));
    assert_eq!(title.available_copies, set(&["BN1-02"]));
    h.assert_consistent().await;
}

#[tokio::test]
async fn blank_copy_numbers_are_rejected() {
    let h = Harness::new();
    let err = h
        .services
        .catalog
        .add_copies_at(
            &add_request("978-0", "Operating Systems", "Silberschatz", &[" ", ""], false),
            day(0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.store.list_titles().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_all_is_rejected_while_a_copy_is_issued() {
    let h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01", "BN1-02"])
        .await;
    h.register("S1", None).await;
    h.services
        .loans
        .issue_at(&issue("S1", "BN1-02", "978-0"), day(0))
        .await
        .unwrap();
    let before = h.title("978-0").await;

    let err = h
        .services
        .catalog
        .delete(&delete_all("978-0"), day(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CopiesIssued { ref copies } if copies == &["BN1-02".to_string()]));
    assert_eq!(h.title("978-0").await, before);

    h.services
        .loans
        .return_at(&give_back("S1", "BN1-02"), day(2))
        .await
        .unwrap();
    let outcome = h
        .services
        .catalog
        .delete(&delete_all("978-0"), day(3))
        .await
        .unwrap();
    assert!(matches!(outcome, CopyRemoval::TitleDeleted { .. }));

    let err = h.services.catalog.get("978-0").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(Entity::Title, _)));
}

#[tokio::test]
async fn selected_delete_spares_other_copies() {
    let h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01", "BN1-02", "BN1-03"])
        .await;
    h.register("S1", None).await;
    h.services
        .loans
        .issue_at(&issue("S1", "BN1-03", "978-0"), day(0))
        .await
        .unwrap();

    let err = h
        .services
        .catalog
        .delete(&delete_some("978-0", &["BN1-01", "BN1-03"]), day(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CopiesIssued { .. }));
    assert_eq!(h.title("978-0").await.all_copies.len(), 3);

    let outcome = h
        .services
        .catalog
        .delete(&delete_some("978-0", &["BN1-01"]), day(1))
        .await
        .unwrap();
    match outcome {
        CopyRemoval::CopiesRemoved { title, removed } => {
            assert_eq!(removed, vec!["BN1-01".to_string()]);
            assert_eq!(title.all_copies, set(&["BN1-02", "BN1-03"]));
        }
        other => panic!("expected partial removal, got {other:?}"),
    }
    h.assert_consistent().await;
}

#[tokio::test]
async fn deleting_unknown_title_is_not_found() {
    let h = Harness::new();
    let err = h
        .services
        .catalog
        .delete(&delete_all("978-9"), day(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(Entity::Title, _)));
}

#[tokio::test]
async fn request_tally_counts_distinct_requesters_and_resolves_on_cataloguing() {
    let mut h = Harness::new();
    h.register("S1", None).await;
    h.register("S2", None).await;

    let requests = &h.services.requests;
    requests
        .submit(&book_request("Clean Code", "Robert Martin"), "S1", day(0))
        .await
        .unwrap();
    requests
        .submit(&book_request("  clean code", "ROBERT MARTIN "), "S1", day(1))
        .await
        .unwrap();
    let tally = requests
        .submit(&book_request("Clean Code", "Robert Martin"), "S2", day(2))
        .await
        .unwrap();
    assert_eq!(tally.count, 2);

    requests
        .submit(&book_request("Refactoring", "Fowler"), "S1", day(3))
        .await
        .unwrap();

    let listed = h.services.requests.list().await.unwrap();
    let order: Vec<&str> = listed.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(order, vec!["clean code", "refactoring"]);

    h.add_title("978-5", "Clean Code", "Robert Martin", &["BN5-01"])
        .await;

    let listed = h.services.requests.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "refactoring");

    let mail = h.sent_mail().await;
    let recipients: BTreeSet<&str> = mail.iter().map(|(to, _)| to.as_str()).collect();
    assert_eq!(recipients, BTreeSet::from(["s1@example.edu", "s2@example.edu"]));
    assert!(mail.iter().all(|(_, subject)| subject == "Now available: Clean Code"));
}

#[tokio::test]
async fn request_resolves_when_last_copy_comes_back() {
    let mut h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01"])
        .await;
    h.register("S1", None).await;
    h.register("S2", None).await;

    h.services
        .loans
        .issue_at(&issue("S1", "BN1-01", "978-0"), day(0))
        .await
        .unwrap();
    h.services
        .requests
        .submit(&book_request("operating systems", "silberschatz"), "S2", day(1))
        .await
        .unwrap();

    let listed = h.services.requests.list().await.unwrap();
    assert_eq!(listed[0].image_url, "https://covers.example.edu/978-0.jpg");
    assert_eq!(listed[0].branches, BTreeSet::from(["cse".to_string()]));

    h.services
        .loans
        .return_at(&give_back("S1", "BN1-01"), day(5))
        .await
        .unwrap();

    assert!(h.services.requests.list().await.unwrap().is_empty());
    let mail = h.sent_mail().await;
    assert!(mail.contains(&(
        "s2@example.edu".to_string(),
        "Now available: Operating Systems".to_string()
    )));
}

#[tokio::test]
async fn available_titles_cannot_be_requested() {
    let h = Harness::new();
    h.add_title("978-0", "Operating Systems", "Silberschatz", &["BN1-01"])
        .await;

    let err = h
        .services
        .requests
        .submit(&book_request("Operating Systems", "Silberschatz"), "S1", day(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    h.services
        .requests
        .submit(&book_request("Compilers", "Aho"), "S1", day(0))
        .await
        .unwrap();
    assert_eq!(h.services.requests.clear().await.unwrap(), 1);
    assert!(h.services.requests.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn feedback_is_filtered_by_range() {
    let h = Harness::new();
    let now = day(100);

    for (message, age) in [("Old note", 40), ("Recent note", 2)] {
        h.services
            .feedback
            .submit(
                CreateFeedback {
                    message: message.to_string(),
                    author: None,
                },
                now - Duration::days(age),
            )
            .await
            .unwrap();
    }

    let week = h.services.feedback.list(FeedbackRange::Week, now).await.unwrap();
    assert_eq!(week.len(), 1);
    assert_eq!(week[0].message, "Recent note");

    let all = h.services.feedback.list(FeedbackRange::All, now).await.unwrap();
    let messages: Vec<&str> = all.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(messages, vec!["Recent note", "Old note"]);

    let err = h
        .services
        .feedback
        .submit(
            CreateFeedback {
                message: "   ".to_string(),
                author: None,
            },
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn broadcast_reaches_selected_departments() {
    let mut h = Harness::new();
    h.register("S1", Some("CSE")).await;
    h.register("S2", Some("ece")).await;
    h.register("S3", None).await;

    let queued = h
        .services
        .borrowers
        .broadcast("Lab closed", &["Computer Science (CSE)".to_string()])
        .await
        .unwrap();
    assert_eq!(queued, 1);

    let queued = h.services.borrowers.broadcast("Library closed", &[]).await.unwrap();
    assert_eq!(queued, 3);

    let mail = h.sent_mail().await;
    assert_eq!(mail.len(), 4);
    assert_eq!(mail[0].0, "s1@example.edu");

    let in_cse = h.services.borrowers.list(Some("cse")).await.unwrap();
    assert_eq!(in_cse.len(), 1);
}

#[tokio::test]
async fn department_labels_at_registration_match_broadcast_labels() {
    let mut h = Harness::new();
    let borrower = h.register("S1", Some("Computer Science (CSE)")).await;
    assert_eq!(borrower.department.as_deref(), Some("cse"));
    h.register("S2", Some("Electronics (ECE)")).await;

    let queued = h
        .services
        .borrowers
        .broadcast("Lab closed", &["Computer Science (CSE)".to_string()])
        .await
        .unwrap();
    assert_eq!(queued, 1);
    assert_eq!(
        h.sent_mail().await,
        vec![(
            "s1@example.edu".to_string(),
            "Message from the library".to_string()
        )]
    );

    let listed = h
        .services
        .borrowers
        .list(Some("Computer Science (CSE)"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "S1");
}

#[tokio::test]
async fn registration_rejects_taken_ids() {
    let h = Harness::new();
    h.register("S1", None).await;

    let err = h
        .store
        .create_borrower(&h.borrower("S1").await)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
