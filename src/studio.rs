//! Application state and command dispatch.
//!
//! [`Studio`] owns everything the front end can change. A front end turns
//! user input into a [`Command`], calls [`Studio::dispatch`], and renders the
//! returned [`Outcome`]. Collaborator failures come back as outcomes; only a
//! failed gallery write is an `Err`.

use crate::analyze::{AnalyzeSessions, PrimingOutcome, TurnOutcome};
use crate::chat::ConversationService;
use crate::error::Result;
use crate::gallery::{GalleryItem, GalleryStore, GalleryView, NewGalleryItem};
use crate::image::{
    EditRequest, GenerationRequest, ImageEditor, ImageGenerator, ImageGeneratorExt,
    UploadedImage,
};
use crate::storage::KeyValueStore;
use std::sync::Arc;

/// Notice for a generate command without a prompt.
pub const MISSING_PROMPT_NOTICE: &str = "Please enter a prompt.";
/// Notice for an edit command without an image or instruction.
pub const MISSING_EDIT_INPUT_NOTICE: &str = "Please upload an image and enter an editing prompt.";
/// Shown when generation fails.
pub const GENERATE_FAILED_MESSAGE: &str =
    "Error generating image. Please check the console for details.";
/// Shown when the edit request fails.
pub const EDIT_FAILED_MESSAGE: &str = "Error editing image. Please check the console for details.";
/// Shown when the edit request succeeds without an image.
pub const EDIT_NO_IMAGE_MESSAGE: &str = "No image was returned from the edit request.";

/// Top-level surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    /// Text-to-image.
    #[default]
    Generate,
    /// Instruction edits.
    Edit,
    /// Image chat.
    Analyze,
    /// Saved results.
    Gallery,
}

/// Something the user asked for.
#[derive(Debug, Clone)]
pub enum Command {
    /// Switch surfaces.
    SelectTab(Tab),
    /// Generate images.
    Generate(GenerationRequest),
    /// Choose the image to edit.
    UploadEditImage(UploadedImage),
    /// Edit the uploaded image.
    Edit {
        /// What to change.
        instruction: String,
    },
    /// Start a chat about a new image.
    UploadAnalyzeImage(UploadedImage),
    /// Send a chat turn.
    SubmitTurn(String),
    /// Open the detail view for a gallery item.
    OpenGalleryItem(u64),
    /// Close the detail view.
    CloseGalleryItem,
    /// Delete the item in the detail view.
    DeleteGalleryItem,
}

/// What happened in response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Input was rejected before any service call.
    Notice(String),
    /// Generated images, as stored in the gallery.
    Generated(Vec<GalleryItem>),
    /// Edited image, as stored in the gallery.
    Edited(GalleryItem),
    /// A service call failed; the surface is usable again.
    Failed(String),
    /// Result of starting a chat session.
    Session(PrimingOutcome),
    /// Result of a chat turn.
    Turn(TurnOutcome),
    /// The gallery to render.
    Gallery(GalleryView),
    /// The item now shown in the detail view.
    Detail(GalleryItem),
    /// No gallery item with that id.
    NotFound,
    /// Command applied; nothing to render.
    Done,
}

/// The application state.
pub struct Studio<G, E, C: ConversationService, K> {
    generator: Arc<G>,
    editor: Arc<E>,
    analyze: Arc<AnalyzeSessions<C>>,
    gallery: GalleryStore<K>,
    active_tab: Tab,
    edit_image: Option<UploadedImage>,
    viewing: Option<u64>,
    retries: u32,
}

impl<G, E, C, K> Studio<G, E, C, K>
where
    G: ImageGenerator,
    E: ImageEditor,
    C: ConversationService,
    K: KeyValueStore,
{
    /// Creates the studio on the Generate tab.
    pub fn new(generator: Arc<G>, editor: Arc<E>, chat: Arc<C>, gallery: GalleryStore<K>) -> Self {
        Self {
            generator,
            editor,
            analyze: Arc::new(AnalyzeSessions::new(chat)),
            gallery,
            active_tab: Tab::default(),
            edit_image: None,
            viewing: None,
            retries: 0,
        }
    }

    /// Retries transient generation failures up to `retries` times.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Changes the retry budget for later generations.
    pub fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }

    /// The gallery.
    pub fn gallery(&self) -> &GalleryStore<K> {
        &self.gallery
    }

    /// The analyze session manager, shareable with other tasks.
    pub fn analyze(&self) -> &Arc<AnalyzeSessions<C>> {
        &self.analyze
    }

    /// The selected surface.
    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    /// Id of the gallery item in the detail view.
    pub fn viewing(&self) -> Option<u64> {
        self.viewing
    }

    /// The image waiting to be edited.
    pub fn edit_image(&self) -> Option<&UploadedImage> {
        self.edit_image.as_ref()
    }

    /// Applies one command.
    pub async fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::SelectTab(tab) => {
                self.active_tab = tab;
                Ok(match tab {
                    Tab::Gallery => Outcome::Gallery(self.gallery.view()),
                    _ => Outcome::Done,
                })
            }
            Command::Generate(request) => self.generate(request).await,
            Command::UploadEditImage(image) => {
                tracing::debug!(mime = %image.mime_type, "edit image selected");
                self.edit_image = Some(image);
                Ok(Outcome::Done)
            }
            Command::Edit { instruction } => self.edit(instruction).await,
            Command::UploadAnalyzeImage(image) => {
                Ok(Outcome::Session(self.analyze.start_session(image).await))
            }
            Command::SubmitTurn(text) => Ok(Outcome::Turn(self.analyze.submit_turn(&text).await)),
            Command::OpenGalleryItem(id) => Ok(match self.gallery.find_by_id(id) {
                Some(item) => {
                    self.viewing = Some(id);
                    Outcome::Detail(item.clone())
                }
                None => Outcome::NotFound,
            }),
            Command::CloseGalleryItem => {
                self.viewing = None;
                Ok(Outcome::Done)
            }
            Command::DeleteGalleryItem => {
                let Some(id) = self.viewing else {
                    return Ok(Outcome::Done);
                };
                self.gallery.delete_by_id(id)?;
                self.viewing = None;
                Ok(Outcome::Gallery(self.gallery.view()))
            }
        }
    }

    async fn generate(&mut self, request: GenerationRequest) -> Result<Outcome> {
        if request.prompt.trim().is_empty() {
            return Ok(Outcome::Notice(MISSING_PROMPT_NOTICE.to_string()));
        }

        let images = match self
            .generator
            .generate_with_retries(&request, self.retries)
            .await
        {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(generator = self.generator.name(), "generation failed: {e}");
                return Ok(Outcome::Failed(GENERATE_FAILED_MESSAGE.to_string()));
            }
        };

        let batch = images
            .iter()
            .map(|image| NewGalleryItem::generated(image.to_data_url(), &request.prompt))
            .collect();
        let stored = self.gallery.add_all(batch)?;
        Ok(Outcome::Generated(stored))
    }

    async fn edit(&mut self, instruction: String) -> Result<Outcome> {
        let Some(image) = self.edit_image.clone() else {
            return Ok(Outcome::Notice(MISSING_EDIT_INPUT_NOTICE.to_string()));
        };
        if instruction.trim().is_empty() {
            return Ok(Outcome::Notice(MISSING_EDIT_INPUT_NOTICE.to_string()));
        }

        let request = EditRequest::new(image, instruction);
        match self.editor.edit(&request).await {
            Ok(Some(edited)) => {
                let item = self.gallery.add(NewGalleryItem::edited(
                    edited.to_data_url(),
                    &request.instruction,
                    request.image.to_data_url(),
                ))?;
                Ok(Outcome::Edited(item))
            }
            Ok(None) => Ok(Outcome::Failed(EDIT_NO_IMAGE_MESSAGE.to_string())),
            Err(e) => {
                tracing::warn!("edit failed: {e}");
                Ok(Outcome::Failed(EDIT_FAILED_MESSAGE.to_string()))
            }
        }
    }
}
