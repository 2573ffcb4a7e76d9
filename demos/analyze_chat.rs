//! Image chat example - primes a session on an image and asks about it.
//!
//! Run with: `cargo run --example analyze_chat -- <image.png> ["question"]`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use genstudio::{AnalyzeSessions, GeminiProvider, PrimingOutcome, TurnOutcome, UploadedImage};
use std::sync::Arc;

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let mut args = std::env::args().skip(1);
    let image_path = args
        .next()
        .expect("Usage: analyze_chat <image.png> [question]");
    let question = args
        .next()
        .unwrap_or_else(|| "Describe this image in one sentence.".to_string());

    let sessions = AnalyzeSessions::new(Arc::new(GeminiProvider::builder().build()?));

    let image = UploadedImage::from_path(&image_path)?;
    match sessions.start_session(image).await {
        PrimingOutcome::Ready => {}
        PrimingOutcome::Failed { message } => {
            eprintln!("{message}");
            std::process::exit(1);
        }
        PrimingOutcome::Superseded => unreachable!("no other upload in this example"),
    }

    match sessions.submit_turn(&question).await {
        TurnOutcome::Replied(text) | TurnOutcome::Failed(text) => println!("{text}"),
        other => println!("{other:?}"),
    }

    for turn in sessions.snapshot().turns {
        println!("{:?}: {}", turn.speaker, turn.text);
    }

    Ok(())
}
