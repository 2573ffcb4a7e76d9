//! Image editing example - modifies an existing image with a text instruction.
//!
//! Run with: `cargo run --example edit_image -- <input_image.png>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use genstudio::{EditRequest, GeminiProvider, ImageEditor, UploadedImage};

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .expect("Usage: edit_image <input_image.png>");

    let provider = GeminiProvider::builder().build()?;

    let image = UploadedImage::from_path(&input_path)?;
    let request = EditRequest::new(image, "Make the colors more vibrant and add a warm sunset glow");

    match provider.edit(&request).await? {
        Some(edited) => {
            let filename = format!("edited.{}", edited.format.extension());
            edited.save(&filename)?;
            println!("Edited image saved to {} ({} bytes)", filename, edited.size());
        }
        None => println!("The model answered without an image."),
    }

    Ok(())
}
