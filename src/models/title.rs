//! Title (one catalog record per ISBN) and its physical copy sets

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Shelf location of a title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShelfLocation {
    pub shelf: String,
    pub row: String,
}

/// Derived availability of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TitleStatus {
    Available,
    Unavailable,
}

/// Catalog record for one ISBN.
///
/// `all_copies` is always the disjoint union of `available_copies` and
/// `issued_copies`. Only the copy-set methods below mutate the three sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Title {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub edition: Option<i32>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub tags: BTreeSet<String>,
    pub branches: BTreeSet<String>,
    pub location: ShelfLocation,
    pub image_url: String,
    pub all_copies: BTreeSet<String>,
    pub available_copies: BTreeSet<String>,
    pub issued_copies: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which copies a deletion targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySelection {
    All,
    Selected(BTreeSet<String>),
}

/// Result of removing copies from a title
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CopyRemoval {
    /// The title lost its last copy and was deleted
    TitleDeleted { isbn: String, removed: Vec<String> },
    /// Some copies remain
    CopiesRemoved { title: Title, removed: Vec<String> },
}

impl Title {
    /// Build a new title whose copies all start out available
    pub fn from_request(request: &AddCopiesRequest, now: DateTime<Utc>) -> Self {
        let copies: BTreeSet<String> = normalize_copies(&request.copy_numbers);
        Self {
            isbn: request.isbn.trim().to_string(),
            title: request.title.trim().to_string(),
            author: request.author.trim().to_string(),
            edition: request.edition,
            publisher: request.publisher.clone(),
            year: request.year,
            tags: request.tags.iter().map(|t| t.trim().to_string()).collect(),
            branches: request.branches.iter().map(|b| b.trim().to_string()).collect(),
            location: request.location.clone(),
            image_url: request.image_url.trim().to_string(),
            all_copies: copies.clone(),
            available_copies: copies,
            issued_copies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TitleStatus {
        if self.available_copies.is_empty() {
            TitleStatus::Unavailable
        } else {
            TitleStatus::Available
        }
    }

    /// `all = available ⊍ issued`
    pub fn is_consistent(&self) -> bool {
        self.available_copies.is_disjoint(&self.issued_copies)
            && self.all_copies.len() == self.available_copies.len() + self.issued_copies.len()
            && self
                .available_copies
                .iter()
                .chain(self.issued_copies.iter())
                .all(|c| self.all_copies.contains(c))
    }

    /// Add copies not already known; returns the ones actually added.
    /// Issued copies are never touched.
    pub fn merge_copies(&mut self, copies: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for copy in normalize_copies(copies) {
            if self.all_copies.insert(copy.clone()) {
                self.available_copies.insert(copy.clone());
                added.push(copy);
            }
        }
        added
    }

    /// Move a copy from available to issued
    pub fn check_out(&mut self, copy: &str) -> AppResult<()> {
        if !self.available_copies.remove(copy) {
            return Err(AppError::CopyUnavailable {
                copy: copy.to_string(),
            });
        }
        self.issued_copies.insert(copy.to_string());
        Ok(())
    }

    /// Move a copy from issued back to available
    pub fn check_in(&mut self, copy: &str) {
        self.issued_copies.remove(copy);
        if self.all_copies.contains(copy) {
            self.available_copies.insert(copy.to_string());
        }
    }

    /// Remove copies, refusing if any targeted copy is issued.
    /// On rejection the title is left unchanged.
    pub fn remove_copies(&mut self, selection: &CopySelection) -> AppResult<Vec<String>> {
        let targeted: BTreeSet<String> = match selection {
            CopySelection::All => self.all_copies.clone(),
            CopySelection::Selected(copies) => copies
                .iter()
                .filter(|c| self.all_copies.contains(*c))
                .cloned()
                .collect(),
        };
        if let CopySelection::Selected(copies) = selection {
            if targeted.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "No copies of {} match: {}",
                    self.isbn,
                    copies.iter().cloned().collect::<Vec<_>>().join(", ")
                )));
            }
        }

        let issued: Vec<String> = targeted.intersection(&self.issued_copies).cloned().collect();
        if !issued.is_empty() {
            return Err(AppError::CopiesIssued { copies: issued });
        }

        for copy in &targeted {
            self.all_copies.remove(copy);
            self.available_copies.remove(copy);
        }
        Ok(targeted.into_iter().collect())
    }

    /// Apply a removal and classify the outcome
    pub fn apply_removal(mut self, selection: &CopySelection) -> AppResult<CopyRemoval> {
        let removed = self.remove_copies(selection)?;
        if self.all_copies.is_empty() {
            Ok(CopyRemoval::TitleDeleted {
                isbn: self.isbn,
                removed,
            })
        } else {
            Ok(CopyRemoval::CopiesRemoved {
                title: self,
                removed,
            })
        }
    }
}

/// Trim copy numbers and drop blanks and duplicates
pub fn normalize_copies(copies: &[String]) -> BTreeSet<String> {
    copies
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Title as exposed by the catalog listing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TitleView {
    #[serde(flatten)]
    pub title: Title,
    pub status: TitleStatus,
    pub copies: usize,
}

impl From<Title> for TitleView {
    fn from(title: Title) -> Self {
        Self {
            status: title.status(),
            copies: title.available_copies.len(),
            title,
        }
    }
}

/// Add-copies request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddCopiesRequest {
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub edition: Option<i32>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    #[validate(length(min = 1, message = "At least one copy number is required"))]
    pub copy_numbers: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub location: ShelfLocation,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1, message = "Please provide an image URL"))]
    pub image_url: String,
    /// Operator confirmed merging copies into an existing ISBN
    #[serde(default)]
    pub confirmed: bool,
}

/// Outcome of an add-copies request
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddCopiesOutcome {
    Created { title: Title },
    Merged { title: Title, added: Vec<String> },
    /// ISBN exists and the request was not confirmed; nothing was written
    Duplicate { existing_title: Title },
}

/// Delete request: either every copy or a selection
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeleteCopiesRequest {
    pub isbn: String,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub copy_numbers: Vec<String>,
}

impl DeleteCopiesRequest {
    pub fn selection(&self) -> AppResult<CopySelection> {
        if self.all {
            return Ok(CopySelection::All);
        }
        let copies = normalize_copies(&self.copy_numbers);
        if copies.is_empty() {
            return Err(AppError::BadRequest(
                "Either all=true or a non-empty copy_numbers list is required".to_string(),
            ));
        }
        Ok(CopySelection::Selected(copies))
    }
}

/// Title row as stored in postgres
#[derive(Debug, FromRow)]
pub struct TitleRow {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub edition: Option<i32>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub tags: Vec<String>,
    pub branches: Vec<String>,
    pub shelf: String,
    pub shelf_row: String,
    pub image_url: String,
    pub all_copies: Vec<String>,
    pub available_copies: Vec<String>,
    pub issued_copies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TitleRow> for Title {
    fn from(row: TitleRow) -> Self {
        Self {
            isbn: row.isbn,
            title: row.title,
            author: row.author,
            edition: row.edition,
            publisher: row.publisher,
            year: row.year,
            tags: row.tags.into_iter().collect(),
            branches: row.branches.into_iter().collect(),
            location: ShelfLocation {
                shelf: row.shelf,
                row: row.shelf_row,
            },
            image_url: row.image_url,
            all_copies: row.all_copies.into_iter().collect(),
            available_copies: row.available_copies.into_iter().collect(),
            issued_copies: row.issued_copies.into_iter().collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
