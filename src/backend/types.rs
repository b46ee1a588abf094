//! Request shapes shared by every document store backend.
//!
//! Only the filters, updates and cursor options the repositories issue are modelled;
//! [`crate::backend::eval`] evaluates all of them in-process.

use bson::{Bson, Document, doc};

/// Document filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Matches every document in the collection.
    All,
    /// Matches documents whose value at `field` (dotted paths allowed) equals `value`.
    Eq { field: String, value: Bson },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::Eq { field, value } => {
                let mut filter = Document::new();
                filter.insert(field.clone(), value.clone());
                filter
            }
        }
    }
}

/// Field-level update applied to the first matching document.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// Replace the named fields only (`$set`).
    Set(Document),
    /// Append `value` to the array at `field`, creating it when absent (`$push`).
    Push { field: String, value: Bson },
    /// Remove every element of the array at `field` that is a document containing all
    /// of the `matching` fields with equal values (`$pull`).
    Pull { field: String, matching: Document },
}

impl Update {
    pub fn to_document(&self) -> Document {
        match self {
            Update::Set(fields) => doc! { "$set": fields.clone() },
            Update::Push { field, value } => {
                let mut push = Document::new();
                push.insert(field.clone(), value.clone());
                doc! { "$push": push }
            }
            Update::Pull { field, matching } => {
                let mut pull = Document::new();
                pull.insert(field.clone(), matching.clone());
                doc! { "$pull": pull }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Maps the conventional `1` / `-1` direction flag; anything negative is descending.
    pub fn from_flag(flag: i32) -> Self {
        if flag < 0 {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn as_flag(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// Cursor options for [`crate::backend::DocumentStore::find`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(String, SortDirection)>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn sorted(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort: Some((field.into(), direction)),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of an update or replace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    /// Zero when the matched document was left unchanged.
    pub modified: u64,
}
