use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use auth_core::DomainResult;

use super::{type_mismatch, FieldCodec, FieldInput, FieldValue, Slot};
use crate::storage::OdmStorage;

/// Reference to an attachment; the attachment id is stored
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentCodec;

#[async_trait]
impl FieldCodec for AttachmentCodec {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::Null) => Ok(Value::Null),
            FieldInput::Attachment(attachment) => Ok(Value::String(attachment.id)),
            FieldInput::Value(Value::String(id)) => {
                // The attachment must exist
                let attachment = storage.attachments().get(&id).await?;
                Ok(Value::String(attachment.id))
            }
            other => Err(type_mismatch(slot.field, "attachment", &other)),
        }
    }

    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        let Some(id) = stored.as_str() else {
            return Ok(FieldValue::Null);
        };
        match storage.attachments().get(id).await {
            Ok(attachment) => Ok(FieldValue::Attachment(attachment)),
            Err(e) if e.is_not_found() => {
                debug!(attachment_id = %id, "Dangling attachment reference");
                Ok(FieldValue::Null)
            }
            Err(e) => Err(e),
        }
    }

    fn finder_values(&self, field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
        match input {
            FieldInput::Attachment(attachment) => Ok(vec![Value::String(attachment.id)]),
            other => super::plain_finder_values(field, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::memory_storage;

    #[tokio::test]
    async fn test_encode_and_decode() {
        let storage = memory_storage();
        let attachment = storage
            .attachments()
            .create_from_url("https://cdn.example.com/a.png")
            .await
            .unwrap();
        let null = Value::Null;
        let slot = Slot {
            field: "picture",
            current: &null,
            record_id: None,
            is_new: false,
        };

        let stored = AttachmentCodec
            .encode(&storage, slot, attachment.clone().into())
            .await
            .unwrap();
        assert_eq!(stored, Value::String(attachment.id.clone()));

        let by_id = AttachmentCodec
            .encode(&storage, slot, attachment.id.clone().into())
            .await
            .unwrap();
        assert_eq!(by_id, stored);

        let decoded = AttachmentCodec.decode(&storage, &stored).await.unwrap();
        assert_eq!(decoded.into_attachment(), Some(attachment.clone()));

        storage.attachments().delete(&attachment.id).await.unwrap();
        assert!(AttachmentCodec.decode(&storage, &stored).await.unwrap().is_null());
        assert!(AttachmentCodec
            .encode(&storage, slot, attachment.id.into())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
