//! Outcome reporting for batch reads and writes.

use super::traits::ObjectDatabase;
use crate::error::Result;
use crate::objects::RevObject;
use crate::types::ObjectId;

/// What happened to one id of a batch operation.
#[derive(Clone, Debug, PartialEq)]
pub enum BulkOutcome {
    Found { id: ObjectId, object: RevObject },
    NotFound(ObjectId),
    Inserted(ObjectId),
    Deleted(ObjectId),
}

impl BulkOutcome {
    pub fn id(&self) -> ObjectId {
        match self {
            BulkOutcome::Found { id, .. }
            | BulkOutcome::NotFound(id)
            | BulkOutcome::Inserted(id)
            | BulkOutcome::Deleted(id) => *id,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, BulkOutcome::Found { .. })
    }

    /// The object carried by a `Found` outcome.
    pub fn into_object(self) -> Option<RevObject> {
        match self {
            BulkOutcome::Found { object, .. } => Some(object),
            _ => None,
        }
    }
}

/// Lazy batch read returned by [`ObjectDatabase::get_all`].
///
/// Each call to `next` reads one id. The iterator is consumed by use and
/// cannot be restarted.
pub struct GetAll<'a, D: ?Sized, I> {
    db: &'a D,
    ids: I,
}

impl<'a, D, I> GetAll<'a, D, I>
where
    D: ObjectDatabase + ?Sized,
    I: Iterator<Item = ObjectId>,
{
    pub(crate) fn new(db: &'a D, ids: I) -> Self {
        Self { db, ids }
    }

    /// Only the found objects, in input order. Read errors are still yielded.
    pub fn objects(self) -> impl Iterator<Item = Result<RevObject>> + 'a
    where
        I: 'a,
    {
        self.filter_map(|outcome| match outcome {
            Ok(outcome) => outcome.into_object().map(Ok),
            Err(e) => Some(Err(e)),
        })
    }
}

impl<'a, D, I> Iterator for GetAll<'a, D, I>
where
    D: ObjectDatabase + ?Sized,
    I: Iterator<Item = ObjectId>,
{
    type Item = Result<BulkOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(self.db.get_if_present(&id).map(|found| match found {
            Some(object) => BulkOutcome::Found { id, object },
            None => BulkOutcome::NotFound(id),
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}
