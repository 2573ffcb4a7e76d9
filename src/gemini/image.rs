//! Imagen generation and Gemini image edits.
//!
//! Generation posts to the Imagen `:predict` endpoint and decodes every
//! returned prediction. Edits send the source image and the instruction to a
//! Gemini image model and take the first inline image of the reply.

use super::wire::{
    is_safety_finish, Content, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, OutputOptions, Part, PredictInstance, PredictParameters, PredictRequest,
    PredictResponse,
};
use super::GeminiProvider;
use crate::error::{Result, StudioError};
use crate::image::{
    EditRequest, GeneratedImage, GenerationMetadata, GenerationRequest, ImageEditor,
    ImageGenerator, MAX_IMAGES_PER_REQUEST,
};
use async_trait::async_trait;
use std::time::Instant;

impl PredictRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: req.full_prompt(),
            }],
            parameters: PredictParameters {
                sample_count: req.count.clamp(1, MAX_IMAGES_PER_REQUEST),
                aspect_ratio: req.aspect_ratio.as_str().to_string(),
                output_options: OutputOptions {
                    mime_type: req.format.mime_type().to_string(),
                },
            },
        }
    }
}

fn edit_contents(req: &EditRequest) -> Vec<Content> {
    vec![Content::user(vec![
        Part::inline(req.image.mime_type.clone(), req.image.to_base64()),
        Part::text(req.instruction.clone()),
    ])]
}

/// Pulls the edited image out of a response.
///
/// `Ok(None)` when the model answered without an image part.
fn extract_edited_image(
    response: GenerateContentResponse,
    metadata: GenerationMetadata,
) -> Result<Option<GeneratedImage>> {
    if let Some(message) = response.block_message() {
        return Err(StudioError::ContentBlocked(message));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(None);
    };
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if is_safety_finish(reason) {
            return Err(StudioError::ContentBlocked(format!(
                "Content blocked by Gemini safety filter: {reason}"
            )));
        }
    }

    let inline = candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data);
    match inline {
        Some(inline) => {
            GeneratedImage::from_base64(&inline.data, Some(inline.mime_type.as_str()), metadata)
                .map(Some)
        }
        None => Ok(None),
    }
}

#[async_trait]
impl ImageGenerator for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
        let start = Instant::now();
        let url = self.endpoint(self.image_model.as_str(), "predict");
        let body = PredictRequest::from_generation_request(request);

        let response: PredictResponse = self.post_json(&url, &body).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut images = Vec::with_capacity(response.predictions.len());
        let mut filtered = None;
        for prediction in response.predictions {
            match prediction.bytes_base64_encoded {
                Some(payload) => images.push(GeneratedImage::from_base64(
                    &payload,
                    prediction.mime_type.as_deref(),
                    GenerationMetadata {
                        model: Some(self.image_model.as_str().to_string()),
                        duration_ms: Some(duration_ms),
                    },
                )?),
                None => filtered = prediction.rai_filtered_reason.or(filtered),
            }
        }

        if images.is_empty() {
            return Err(match filtered {
                Some(reason) => StudioError::ContentBlocked(reason),
                None => StudioError::UnexpectedResponse("No images in Imagen response".into()),
            });
        }
        tracing::debug!(count = images.len(), duration_ms, "Imagen generation complete");
        Ok(images)
    }

    fn name(&self) -> &str {
        "Imagen (Google)"
    }
}

#[async_trait]
impl ImageEditor for GeminiProvider {
    async fn edit(&self, request: &EditRequest) -> Result<Option<GeneratedImage>> {
        let start = Instant::now();
        let url = self.endpoint(self.edit_model.as_str(), "generateContent");
        let contents = edit_contents(request);
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            }),
        };

        let response: GenerateContentResponse = self.post_json(&url, &body).await?;
        let metadata = GenerationMetadata {
            model: Some(self.edit_model.as_str().to_string()),
            duration_ms: Some(start.elapsed().as_millis() as u64),
        };
        let edited = extract_edited_image(response, metadata)?;
        if edited.is_none() {
            tracing::warn!("Gemini edit response contained no image part");
        }
        Ok(edited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{AspectRatio, ImageFormat, UploadedImage};

    #[test]
    fn test_predict_request_construction() {
        let req = GenerationRequest::new("a lighthouse")
            .with_negative_prompt("people")
            .with_count(3)
            .with_aspect_ratio(AspectRatio::Landscape);
        let body = PredictRequest::from_generation_request(&req);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["instances"][0]["prompt"], "a lighthouse --no people");
        assert_eq!(json["parameters"]["sampleCount"], 3);
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
        assert_eq!(json["parameters"]["outputOptions"]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_predict_request_clamps_sample_count() {
        let mut req = GenerationRequest::new("a lighthouse");
        req.count = 0;
        let body = PredictRequest::from_generation_request(&req);
        assert_eq!(body.parameters.sample_count, 1);

        req.count = 12;
        let body = PredictRequest::from_generation_request(&req);
        assert_eq!(body.parameters.sample_count, MAX_IMAGES_PER_REQUEST);
    }

    #[test]
    fn test_predict_response_deserialization() {
        let json = r#"{
            "predictions": [
                {"bytesBase64Encoded": "/9j/4AAAAAAAAAAA", "mimeType": "image/jpeg"},
                {"raiFilteredReason": "filtered"}
            ]
        }"#;
        let resp: PredictResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.predictions.len(), 2);
        assert!(resp.predictions[1].bytes_base64_encoded.is_none());
    }

    #[test]
    fn test_edit_contents_put_image_first() {
        let image = UploadedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let contents = edit_contents(&EditRequest::new(image, "add a hat"));
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".into(), "TEXT".into()],
            }),
        };
        let json = serde_json::to_value(&body).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["text"], "add a hat");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_extract_edited_image() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgoAAAAA"}}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let image = extract_edited_image(resp, GenerationMetadata::default())
            .unwrap()
            .unwrap();
        assert_eq!(image.format, ImageFormat::Png);
    }

    #[test]
    fn test_text_only_edit_is_absent_not_error() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "I can't do that"}]}}]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let result = extract_edited_image(resp, GenerationMetadata::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_safety_finish_is_error() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let result = extract_edited_image(resp, GenerationMetadata::default());
        assert!(matches!(result, Err(StudioError::ContentBlocked(_))));
    }
}
