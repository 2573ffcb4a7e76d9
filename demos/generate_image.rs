//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use genstudio::{AspectRatio, GeminiProvider, GenerationRequest, ImageGenerator};

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let provider = GeminiProvider::builder().build()?;

    let request = GenerationRequest::new("A golden retriever puppy playing in snow")
        .with_negative_prompt("people")
        .with_count(2)
        .with_aspect_ratio(AspectRatio::Landscape);
    let images = provider.generate(&request).await?;

    for (i, image) in images.iter().enumerate() {
        let filename = format!("output-{i}.{}", image.format.extension());
        image.save(&filename)?;
        println!("Saved {} ({} bytes)", filename, image.size());
    }

    Ok(())
}
