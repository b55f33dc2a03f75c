use std::collections::HashMap;

use iced::widget::{button, column, container, image, row, text};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::error::StoreError;
use crate::store::{AssetId, AssetRecord, AssetStore};
use crate::Message;

const THUMBNAIL_SIZE: f32 = 128.0;

/// A stored skin plus its decoded thumbnail
#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub record: AssetRecord,
    thumbnail: Option<image::Handle>,
}

impl GalleryItem {
    /// Decodes the thumbnail; keep this off the UI thread.
    pub fn new(record: AssetRecord) -> Self {
        let thumbnail = match record.payload.decode() {
            Ok(bytes) => Some(image::Handle::from_bytes(bytes)),
            Err(e) => {
                log::warn!("⚠️  Skin {} has no preview: {}", record.id, e);
                None
            }
        };
        Self { record, thumbnail }
    }
}

/// Project store records onto gallery items in record order.
///
/// Items already in `previous` keep their decoded thumbnail; only records
/// with an unseen id are decoded.
pub fn project(records: Vec<AssetRecord>, previous: Vec<GalleryItem>) -> Vec<GalleryItem> {
    let mut known: HashMap<AssetId, GalleryItem> = previous
        .into_iter()
        .map(|item| (item.record.id, item))
        .collect();

    records
        .into_iter()
        .map(|record| {
            known
                .remove(&record.id)
                .unwrap_or_else(|| GalleryItem::new(record))
        })
        .collect()
}

/// Gallery items for the store's current mirror, decoded on the blocking pool
pub async fn sync(
    store: &AssetStore,
    previous: Vec<GalleryItem>,
) -> Result<Vec<GalleryItem>, StoreError> {
    let records = store.records().await;
    tokio::task::spawn_blocking(move || project(records, previous))
        .await
        .map_err(|e| StoreError::Unavailable(format!("Task join error: {}", e)))
}

/// Grid of thumbnails, each with Delete and Download buttons
pub fn view(items: &[GalleryItem], selected: Option<AssetId>) -> Element<'_, Message> {
    if items.is_empty() {
        return container(text("No skins yet. Upload one to get started.").size(16))
            .padding(20)
            .into();
    }

    let tiles: Vec<Element<'_, Message>> = items
        .iter()
        .map(|item| tile(item, selected == Some(item.record.id)))
        .collect();

    Wrap::with_elements(tiles)
        .spacing(12.0)
        .line_spacing(12.0)
        .into()
}

fn tile(item: &GalleryItem, selected: bool) -> Element<'_, Message> {
    let id = item.record.id;

    let preview: Element<'_, Message> = match &item.thumbnail {
        Some(handle) => image(handle.clone())
            .filter_method(image::FilterMethod::Nearest)
            .width(THUMBNAIL_SIZE)
            .height(THUMBNAIL_SIZE)
            .into(),
        None => container(text("?").size(32))
            .width(THUMBNAIL_SIZE)
            .height(THUMBNAIL_SIZE)
            .center_x(THUMBNAIL_SIZE)
            .center_y(THUMBNAIL_SIZE)
            .into(),
    };

    let preview = button(preview)
        .on_press(Message::Select(id))
        .padding(4)
        .style(if selected {
            button::primary
        } else {
            button::text
        });

    let actions = row![
        button(text("Delete").size(12))
            .on_press(Message::Delete(id))
            .style(button::danger),
        button(text("Download").size(12))
            .on_press(Message::Download(id))
            .style(button::secondary),
    ]
    .spacing(6);

    column![preview, actions]
        .spacing(6)
        .align_x(Alignment::Center)
        .width(Length::Shrink)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::payload::sample_skin;
    use crate::store::SkinPayload;

    fn record(id: i64, payload: SkinPayload) -> AssetRecord {
        AssetRecord {
            id: AssetId(id),
            payload,
        }
    }

    #[test]
    fn test_project_follows_records() {
        let previous = project(
            vec![record(1, sample_skin(1)), record(2, sample_skin(2))],
            Vec::new(),
        );
        let kept = previous[1].thumbnail.as_ref().map(|h| h.id());

        let items = project(
            vec![record(2, sample_skin(2)), record(3, sample_skin(3))],
            previous,
        );

        let ids: Vec<_> = items.iter().map(|item| item.record.id).collect();
        assert_eq!(ids, vec![AssetId(2), AssetId(3)]);
        assert_eq!(items[0].thumbnail.as_ref().map(|h| h.id()), kept);
        assert!(items[1].thumbnail.is_some());
    }

    #[test]
    fn test_undecodable_record_has_no_thumbnail() {
        let broken = SkinPayload::from_stored(b"data:image/png;base64,@@@".to_vec());
        let items = project(vec![record(1, broken)], Vec::new());
        assert_eq!(items.len(), 1);
        assert!(items[0].thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_sync_reads_store_mirror() {
        let store = AssetStore::new();
        store
            .initialize(crate::store::SqliteStore::open_in_memory)
            .await
            .unwrap();
        let first = store.add(sample_skin(1)).await.unwrap();
        store.add(sample_skin(2)).await.unwrap();
        store.remove_by_id(first.id).await.unwrap();

        let items = sync(&store, Vec::new()).await.unwrap();
        let records: Vec<_> = items.into_iter().map(|item| item.record).collect();
        assert_eq!(records, store.records().await);
    }
}
