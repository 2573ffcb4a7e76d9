//! Scripted collaborators for unit tests.

use crate::chat::{ConversationService, SessionSeed};
use crate::error::{Result, StudioError};
use crate::image::{
    EditRequest, GeneratedImage, GenerationMetadata, GenerationRequest, ImageEditor,
    ImageFormat, ImageGenerator, UploadedImage,
};
use crate::storage::{KeyValueStore, MemoryStore};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A tiny PNG-tagged image whose last byte is `tag`.
pub(crate) fn png_image(tag: u8) -> UploadedImage {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    data.push(tag);
    UploadedImage::new(data).with_name(format!("img{tag}.png"))
}

fn fake_output(tag: usize) -> GeneratedImage {
    GeneratedImage::new(
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0, tag as u8],
        ImageFormat::Jpeg,
        GenerationMetadata {
            model: Some("scripted".into()),
            duration_ms: Some(1),
        },
    )
}

/// Generator that replays a script of image counts or errors.
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<usize>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Vec<Result<usize>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.full_prompt());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(request.count as usize));
        next.map(|count| (0..count).map(fake_output).collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Editor that replays a script; `Ok(false)` means "no image returned".
pub(crate) struct ScriptedEditor {
    script: Mutex<VecDeque<Result<bool>>>,
    calls: AtomicUsize,
}

impl ScriptedEditor {
    pub(crate) fn new(script: Vec<Result<bool>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEditor for ScriptedEditor {
    async fn edit(&self, _request: &EditRequest) -> Result<Option<GeneratedImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(true));
        next.map(|produced| produced.then(|| fake_output(99)))
    }
}

/// Handle issued by [`ScriptedChat`].
#[derive(Debug)]
pub(crate) struct ScriptedHandle {
    #[allow(dead_code)]
    pub(crate) id: u64,
}

/// Conversation service with queued replies and per-text holds.
///
/// Replies are taken when a turn arrives; unqueued turns answer "OK". A turn
/// whose text has a hold waits for the hold's `Notify` before answering.
pub(crate) struct ScriptedChat {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    sent: Mutex<Vec<String>>,
    seeds: Mutex<Vec<String>>,
    fail_create: AtomicBool,
    next_id: AtomicU64,
}

impl ScriptedChat {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            holds: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            seeds: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn push_reply(&self, reply: std::result::Result<String, String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn hold(&self, text: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .insert(text.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn release_holds(&self) {
        self.holds.lock().unwrap().clear();
    }

    pub(crate) fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn seeds(&self) -> Vec<String> {
        self.seeds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationService for ScriptedChat {
    type Handle = ScriptedHandle;

    async fn create_session(&self, seed: &SessionSeed) -> Result<ScriptedHandle> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(StudioError::Conversation("create failed".into()));
        }
        self.seeds.lock().unwrap().push(seed.instruction.clone());
        Ok(ScriptedHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn send_turn(&self, _handle: &ScriptedHandle, text: &str) -> Result<String> {
        let (reply, gate) = {
            self.sent.lock().unwrap().push(text.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("OK".to_string()));
            let gate = self.holds.lock().unwrap().get(text).cloned();
            (reply, gate)
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        reply.map_err(StudioError::Conversation)
    }
}

/// In-memory store that refuses writes once its allowance is used up.
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    allowed: AtomicUsize,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: MemoryStore::new(),
            writes: AtomicUsize::new(0),
            allowed: AtomicUsize::new(usize::MAX),
        }
    }
}

impl FlakyStore {
    /// Lets `n` more writes through; later ones fail.
    pub(crate) fn allow_writes(&self, n: usize) {
        let done = self.writes.load(Ordering::SeqCst);
        self.allowed.store(done.saturating_add(n), Ordering::SeqCst);
    }

    /// Writes that reached the inner store.
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for FlakyStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.writes.load(Ordering::SeqCst) >= self.allowed.load(Ordering::SeqCst) {
            return Err(StudioError::Storage("disk full".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, value)
    }
}
