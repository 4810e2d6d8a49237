use crate::id::Id;

/// Summary returned by `delete_one` and `delete_many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub(crate) fn new(deleted_count: u64) -> Self {
        DeleteResult {
            acknowledged: true,
            deleted_count,
        }
    }
}

/// Summary returned by `update_one` and `update_many`.
///
/// `matched_count` counts documents selected by the filter; `modified_count`
/// only those whose content actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Id>,
}

impl UpdateResult {
    pub(crate) fn matched(matched_count: u64, modified_count: u64) -> Self {
        UpdateResult {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub(crate) fn upserted(id: Id) -> Self {
        UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_result_is_acknowledged() {
        let result = DeleteResult::new(3);
        assert!(result.acknowledged);
        assert_eq!(result.deleted_count, 3);
    }

    #[test]
    fn update_result_constructors() {
        let result = UpdateResult::matched(2, 1);
        assert_eq!((result.matched_count, result.modified_count, result.upserted_count), (2, 1, 0));
        assert!(result.upserted_id.is_none());

        let result = UpdateResult::upserted(Id::from("x"));
        assert_eq!(result.upserted_count, 1);
        assert_eq!(result.upserted_id, Some(Id::from("x")));
    }
}
