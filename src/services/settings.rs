//! Storefront settings: hero carousel banners and the announcement bar.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::announcement::{
    self, ActiveModel as AnnouncementActiveModel, Entity as AnnouncementEntity,
    Model as AnnouncementModel, MAIN_ANNOUNCEMENT_ID,
};
use crate::entities::hero_banner::{
    self, ActiveModel as BannerActiveModel, Entity as BannerEntity, Model as BannerModel,
};
use crate::errors::ServiceError;

/// Announcement text shown until an admin edits it.
const DEFAULT_ANNOUNCEMENT_TEXT: &str =
    "Direct from authorized distributors. #1 Supplement Store.";

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBannerRequest {
    #[validate(length(min = 1, message = "Image URL is required"))]
    pub image_url: String,
    #[serde(default)]
    pub link: String,
    /// Appended after the current last slide when omitted.
    pub position: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBannerRequest {
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, message = "Announcement text is required"))]
    pub text: String,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct SettingsService {
    db: Arc<DatabaseConnection>,
}

impl SettingsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_banners(&self) -> Result<Vec<BannerModel>, ServiceError> {
        Ok(BannerEntity::find()
            .order_by_asc(hero_banner::Column::Position)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_banner(
        &self,
        request: CreateBannerRequest,
    ) -> Result<BannerModel, ServiceError> {
        request.validate()?;

        let position = match request.position {
            Some(position) => position,
            None => {
                let last: Option<BannerModel> = BannerEntity::find()
                    .order_by_desc(hero_banner::Column::Position)
                    .limit(1)
                    .one(&*self.db)
                    .await?;
                last.map(|b| b.position + 1).unwrap_or(0)
            }
        };

        let banner = BannerActiveModel {
            id: Set(Uuid::new_v4()),
            image_url: Set(request.image_url),
            link: Set(request.link),
            position: Set(position),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(banner_id = %banner.id, position, "hero banner created");
        Ok(banner)
    }

    #[instrument(skip(self, request))]
    pub async fn update_banner(
        &self,
        banner_id: Uuid,
        request: UpdateBannerRequest,
    ) -> Result<BannerModel, ServiceError> {
        let existing = BannerEntity::find_by_id(banner_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("banner {} not found", banner_id)))?;

        let mut active: BannerActiveModel = existing.into();
        if let Some(image_url) = request.image_url {
            active.image_url = Set(image_url);
        }
        if let Some(link) = request.link {
            active.link = Set(link);
        }
        if let Some(position) = request.position {
            active.position = Set(position);
        }

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_banner(&self, banner_id: Uuid) -> Result<(), ServiceError> {
        let result = BannerEntity::delete_by_id(banner_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "banner {} not found",
                banner_id
            )));
        }
        Ok(())
    }

    /// Returns the singleton announcement, creating it with the default
    /// text on first read.
    #[instrument(skip(self))]
    pub async fn get_announcement(&self) -> Result<AnnouncementModel, ServiceError> {
        if let Some(existing) = AnnouncementEntity::find_by_id(MAIN_ANNOUNCEMENT_ID)
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let created = AnnouncementActiveModel {
            id: Set(MAIN_ANNOUNCEMENT_ID.to_string()),
            text: Set(DEFAULT_ANNOUNCEMENT_TEXT.to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!("announcement row created with default text");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_announcement(
        &self,
        request: UpdateAnnouncementRequest,
    ) -> Result<AnnouncementModel, ServiceError> {
        request.validate()?;

        // get-or-create so the update works even before the first read.
        let existing = self.get_announcement().await?;
        let mut active: announcement::ActiveModel = existing.into();
        active.text = Set(request.text);
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(&*self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_announcement_text_fails_validation() {
        let request = UpdateAnnouncementRequest {
            text: String::new(),
            is_active: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn banner_request_defaults_link_to_empty() {
        let json = r#"{"imageUrl": "/banner1.png"}"#;
        let request: CreateBannerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.link, "");
        assert!(request.position.is_none());
    }
}
