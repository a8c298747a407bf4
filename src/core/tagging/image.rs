//! Image Tagging Pipeline
//!
//! The video workflow's shape without segmentation: clear-if-retagging,
//! description generation, tag generation. Same failure policy as the video
//! pipeline: generation failures degrade, store failures end the run as
//! `error`, and `run` only returns `Err` for an unknown image id.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::ai::GenerationClient;
use crate::core::settings::TaggingSettings;
use crate::core::store::{Database, Image, Provenance, TagOwner};
use crate::core::{CoreResult, MediaStatus};

use super::context;
use super::{degrade, ImageTaggingReport};

// =============================================================================
// Pipeline
// =============================================================================

/// Orchestrates tagging runs for images
pub struct ImageTaggingPipeline {
    db: Database,
    generator: GenerationClient,
    settings: TaggingSettings,
}

impl ImageTaggingPipeline {
    /// Creates a pipeline over its collaborators
    pub fn new(db: Database, generator: GenerationClient, settings: TaggingSettings) -> Self {
        Self {
            db,
            generator,
            settings,
        }
    }

    /// Runs the full tagging workflow for an image
    pub async fn run(&self, image_id: &str) -> CoreResult<ImageTaggingReport> {
        let image = self.db.get_image(image_id)?;
        info!("Starting tagging run for image {}", image.filename);

        if image.status == MediaStatus::Tagged {
            debug!("Re-tagging {}; clearing generated tags", image.filename);
            self.db.clear_generated(TagOwner::Image(image_id))?;
        }

        self.db
            .set_image_status(image_id, MediaStatus::Processing, None)?;

        let mut report = ImageTaggingReport::new(image_id);
        match self.run_stages(&image, &mut report).await {
            Ok(()) => {
                self.db
                    .set_image_status(image_id, MediaStatus::Tagged, None)?;
                report.status = MediaStatus::Tagged;
                info!("Tagging complete for image {}", image.filename);
            }
            Err(e) => {
                warn!("Tagging failed for image {}: {}", image.filename, e);
                let message = e.to_string();
                self.db
                    .set_image_status(image_id, MediaStatus::Error, Some(&message))?;
                report.status = MediaStatus::Error;
                report.error = Some(message);
            }
        }

        Ok(report)
    }

    /// Runs the stage sequence; any returned error is a store failure
    async fn run_stages(&self, image: &Image, report: &mut ImageTaggingReport) -> CoreResult<()> {
        report.description = self.generate_description(image).await?;
        report.tags = self
            .generate_tags(image, report.description.as_deref())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Description Stage
    // =========================================================================

    /// Generates and stores the image description; absent on degraded failure
    async fn generate_description(&self, image: &Image) -> CoreResult<Option<String>> {
        if !Path::new(&image.file_path).exists() {
            warn!("Image file not found: {}", image.file_path);
            return Ok(None);
        }

        let prompt = context::image_description_prompt(&image.filename);
        let media = [Path::new(&image.file_path).to_path_buf()];
        let result = self.generator.generate_with_media(&prompt, &media).await;

        let Some(text) = degrade(result, "image description")? else {
            return Ok(None);
        };

        let description = text.trim().to_string();
        if description.is_empty() {
            return Ok(None);
        }

        self.db.set_image_description(&image.id, &description)?;
        Ok(Some(description))
    }

    // =========================================================================
    // Tagging Stage
    // =========================================================================

    /// Generates and attaches tags; empty on degraded failure
    async fn generate_tags(
        &self,
        image: &Image,
        description: Option<&str>,
    ) -> CoreResult<Vec<String>> {
        if !Path::new(&image.file_path).exists() {
            warn!("Image file not found: {}", image.file_path);
            return Ok(Vec::new());
        }

        let prompt = context::image_tags_prompt(&image.filename, description);
        let media = [Path::new(&image.file_path).to_path_buf()];
        let result = self
            .generator
            .generate_tag_list_with_media(&prompt, &media, self.settings.image_tag_cap)
            .await;

        let Some(names) = degrade(result, "image tagging")? else {
            return Ok(Vec::new());
        };

        let mut attached = Vec::new();
        for name in names {
            let tag = self.db.find_or_create_tag(&name)?;
            if self
                .db
                .attach(TagOwner::Image(&image.id), &tag.id, Provenance::AiGenerated(None))?
            {
                attached.push(tag.name);
            }
        }

        debug!("Attached {} tags to image {}", attached.len(), image.filename);
        Ok(attached)
    }
}
