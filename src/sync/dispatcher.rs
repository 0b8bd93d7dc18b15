use crate::error::DispatchError;
use crate::events::{collection_for, document_id, ChangeEvent, Operation, Record};
use serde::Serialize;

/// Effect to apply to the document store for one change event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAction {
    pub collection: String,
    pub document_id: String,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "body", rename_all = "snake_case")]
pub enum ActionKind {
    /// Insert or replace the whole document.
    Upsert(Record),
    Delete,
}

impl DocumentAction {
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, ActionKind::Delete)
    }
}

/// Select the document action for an event.
///
/// Creates, snapshots and updates all become full-document upserts of the
/// after-image so that redelivery and missed creates converge on the same
/// state. Deletes and tombstones both remove the document.
pub fn dispatch(event: ChangeEvent) -> Result<DocumentAction, DispatchError> {
    let collection = collection_for(&event.source_topic);
    let document_id = document_id(event.key.as_ref())?;

    let kind = match event.operation {
        Operation::Create | Operation::Snapshot | Operation::Update => {
            let body = event
                .after
                .ok_or(DispatchError::MissingAfterImage(event.operation))?;
            ActionKind::Upsert(body)
        }
        Operation::Delete | Operation::Tombstone => ActionKind::Delete,
    };

    Ok(DocumentAction {
        collection,
        document_id,
        kind,
    })
}
