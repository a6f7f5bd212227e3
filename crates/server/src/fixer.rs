use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Song, AI_CHECKED_ARTIST, PLACEHOLDER_ARTISTS};
use library::{Catalog, LibraryError};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FixerConfig;
use crate::external::TextModel;
use crate::utils::{first_json_object, strip_code_fences};

/// Source of the worker's delays, swapped out in tests.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataFix {
    Repaired { artist: String, title: String },
    Unresolved,
}

pub fn build_fix_prompt(filename: &str) -> String {
    format!(
        "Filename: \"{}\"\n\
         Task: Identify 'Artist' and 'Title'.\n\
         Rules: Use your music knowledge. Remove 'official', 'lyrics', 'mp3'.\n\
         Return JSON ONLY: {{\"artist\": \"Name\", \"title\": \"Title\"}}",
        filename
    )
}

/// Artist answers that would leave the song in the repair queue.
fn is_unusable_artist(artist: &str) -> bool {
    artist.eq_ignore_ascii_case(AI_CHECKED_ARTIST)
        || PLACEHOLDER_ARTISTS
            .iter()
            .any(|placeholder| artist.eq_ignore_ascii_case(placeholder))
}

/// Reads the model's answer. Anything short of a usable artist and title
/// leaves the song unresolved.
pub fn interpret_fix_reply(reply: &str) -> MetadataFix {
    let cleaned = strip_code_fences(reply);
    let Some(found) = first_json_object(&cleaned) else {
        return MetadataFix::Unresolved;
    };
    let Ok(value) = serde_json::from_str::<Value>(found) else {
        return MetadataFix::Unresolved;
    };
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };
    match (field("artist"), field("title")) {
        (Some(artist), Some(title)) if !is_unusable_artist(&artist) => {
            MetadataFix::Repaired { artist, title }
        }
        _ => MetadataFix::Unresolved,
    }
}

fn file_name(src: &str) -> &str {
    src.rsplit('/').next().unwrap_or(src)
}

pub struct MetadataFixer {
    catalog: Catalog,
    model: Arc<dyn TextModel>,
    pacer: Arc<dyn Pacer>,
    settings: FixerConfig,
}

impl MetadataFixer {
    pub fn new(
        catalog: Catalog,
        model: Arc<dyn TextModel>,
        pacer: Arc<dyn Pacer>,
        settings: FixerConfig,
    ) -> Self {
        Self {
            catalog,
            model,
            pacer,
            settings,
        }
    }

    /// Polls for songs with placeholder artists until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Metadata fixer started");
        while !cancel.is_cancelled() {
            let batch = match self
                .catalog
                .list_songs_pending_repair(self.settings.batch_size)
            {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("Metadata fixer could not read pending songs: {}", err);
                    if !self.pause(self.settings.idle(), &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                debug!("No songs pending repair");
                if !self.pause(self.settings.idle(), &cancel).await {
                    break;
                }
                continue;
            }

            info!("Repairing metadata for {} songs", batch.len());
            for song in &batch {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    outcome = self.repair_song(song) => Some(outcome),
                };
                match outcome {
                    None => break,
                    Some(Ok(MetadataFix::Repaired { artist, title })) => {
                        info!("Fixed song {}: {} by {}", song.id, title, artist)
                    }
                    Some(Ok(MetadataFix::Unresolved)) => {
                        debug!("Song {} marked as checked", song.id)
                    }
                    Some(Err(err)) => warn!("Failed to update song {}: {}", song.id, err),
                }
                if !self.pause(self.settings.row_delay(), &cancel).await {
                    break;
                }
            }
            if !self.pause(self.settings.batch_delay(), &cancel).await {
                break;
            }
        }
        info!("Metadata fixer stopped");
    }

    async fn repair_song(&self, song: &Song) -> Result<MetadataFix, LibraryError> {
        let filename = file_name(&song.src);
        let fix = match self.model.generate(&build_fix_prompt(filename)).await {
            Ok(reply) => interpret_fix_reply(&reply),
            Err(err) => {
                warn!("Model call failed for {:?}: {}", filename, err);
                MetadataFix::Unresolved
            }
        };
        match &fix {
            MetadataFix::Repaired { artist, title } => {
                self.catalog.update_song_metadata(song.id, artist, title)?
            }
            MetadataFix::Unresolved => self.catalog.mark_song_checked(song.id)?,
        }
        Ok(fix)
    }

    /// Returns false once the worker should stop.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.pacer.sleep(duration) => !cancel.is_cancelled(),
        }
    }
}

pub fn start_metadata_fixer(fixer: MetadataFixer, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move { fixer.run(cancel).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalError;
    use common::{NewSong, AI_CHECKED_ARTIST, UNKNOWN_ARTIST};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ExternalError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<&str, ExternalError>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|reply| reply.map(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
            self.prompts.lock().push(prompt.to_string());
            self.replies.lock().pop_front().unwrap_or(Err(ExternalError::Empty))
        }
    }

    /// Records each requested delay and cancels after `limit` of them.
    struct RecordingPacer {
        sleeps: Mutex<Vec<Duration>>,
        limit: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn sleep(&self, duration: Duration) {
            let mut sleeps = self.sleeps.lock();
            sleeps.push(duration);
            if sleeps.len() >= self.limit {
                self.cancel.cancel();
            }
        }
    }

    fn catalog_with(songs: &[(&str, &str)]) -> (Catalog, Vec<Song>) {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.init_tables().unwrap();
        let songs = songs
            .iter()
            .map(|(src, artist)| {
                catalog
                    .insert_song(&NewSong {
                        title: "raw".to_string(),
                        artist: artist.to_string(),
                        src: src.to_string(),
                        cover: common::DEFAULT_COVER.to_string(),
                    })
                    .unwrap()
            })
            .collect();
        (catalog, songs)
    }

    #[test]
    fn accepts_fenced_json() {
        let reply = "```json\n{\"artist\": \"Daft Punk\", \"title\": \"One More Time\"}\n```";
        assert_eq!(
            interpret_fix_reply(reply),
            MetadataFix::Repaired {
                artist: "Daft Punk".to_string(),
                title: "One More Time".to_string(),
            }
        );
    }

    #[test]
    fn rejects_unknown_missing_or_garbled_replies() {
        assert_eq!(
            interpret_fix_reply(r#"{"artist": "Unknown", "title": "X"}"#),
            MetadataFix::Unresolved
        );
        assert_eq!(
            interpret_fix_reply(r#"{"artist": "Unknown Artist", "title": "X"}"#),
            MetadataFix::Unresolved
        );
        assert_eq!(
            interpret_fix_reply(r#"{"artist": "unknown artist", "title": "X"}"#),
            MetadataFix::Unresolved
        );
        assert_eq!(interpret_fix_reply(r#"{"title": "X"}"#), MetadataFix::Unresolved);
        assert_eq!(interpret_fix_reply(r#"{"artist": "A"}"#), MetadataFix::Unresolved);
        assert_eq!(interpret_fix_reply("I have no idea"), MetadataFix::Unresolved);
        assert_eq!(interpret_fix_reply("{artist: A}"), MetadataFix::Unresolved);
    }

    #[test]
    fn prompt_names_the_file() {
        let prompt = build_fix_prompt("track01.mp3");
        assert!(prompt.contains("Filename: \"track01.mp3\""));
        assert!(prompt.contains(r#"{"artist": "Name", "title": "Title"}"#));
    }

    #[tokio::test]
    async fn repairs_batch_and_marks_failures() {
        let (catalog, songs) = catalog_with(&[
            ("/assets/music/A/daft punk one more time.mp3", UNKNOWN_ARTIST),
            ("/assets/music/A/garbage.mp3", "Unknown"),
            ("/assets/music/A/offline.mp3", UNKNOWN_ARTIST),
            ("/assets/music/A/known.mp3", "Queen"),
        ]);
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(r#"{"artist": "Daft Punk", "title": "One More Time"}"#),
            Ok("no json here"),
            Err(ExternalError::Status(429)),
        ]));
        let cancel = CancellationToken::new();
        // three row delays, then the batch delay cancels
        let pacer = Arc::new(RecordingPacer {
            sleeps: Mutex::new(Vec::new()),
            limit: 4,
            cancel: cancel.clone(),
        });
        let fixer = MetadataFixer::new(
            catalog.clone(),
            model.clone(),
            pacer.clone(),
            FixerConfig::default(),
        );

        fixer.run(cancel).await;

        let fixed = catalog.get_song(songs[0].id).unwrap().unwrap();
        assert_eq!(fixed.artist, "Daft Punk");
        assert_eq!(fixed.title, "One More Time");
        for song in &songs[1..3] {
            let song = catalog.get_song(song.id).unwrap().unwrap();
            assert_eq!(song.artist, AI_CHECKED_ARTIST);
            assert_eq!(song.title, "raw");
        }
        assert_eq!(catalog.get_song(songs[3].id).unwrap().unwrap().artist, "Queen");
        assert!(catalog.list_songs_pending_repair(10).unwrap().is_empty());

        let prompts = model.prompts.lock();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("daft punk one more time.mp3"));

        let sleeps = pacer.sleeps.lock();
        assert_eq!(
            *sleeps,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(2),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ]
        );
    }

    #[tokio::test]
    async fn placeholder_answers_do_not_stall_the_queue() {
        let (catalog, songs) = catalog_with(&[
            ("/assets/music/A/first.mp3", UNKNOWN_ARTIST),
            ("/assets/music/A/second.mp3", UNKNOWN_ARTIST),
        ]);
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(r#"{"artist": "Unknown Artist", "title": "first"}"#),
            Ok(r#"{"artist": "Muse", "title": "Uprising"}"#),
        ]));
        let cancel = CancellationToken::new();
        let pacer = Arc::new(RecordingPacer {
            sleeps: Mutex::new(Vec::new()),
            limit: 3,
            cancel: cancel.clone(),
        });
        let settings = FixerConfig {
            batch_size: 1,
            ..FixerConfig::default()
        };
        let fixer = MetadataFixer::new(catalog.clone(), model.clone(), pacer, settings);

        fixer.run(cancel).await;

        let first = catalog.get_song(songs[0].id).unwrap().unwrap();
        assert_eq!(first.artist, AI_CHECKED_ARTIST);
        assert_eq!(first.title, "raw");
        let second = catalog.get_song(songs[1].id).unwrap().unwrap();
        assert_eq!(second.artist, "Muse");
        assert_eq!(model.prompts.lock().len(), 2);
        assert!(catalog.list_songs_pending_repair(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn idles_when_nothing_is_pending() {
        let (catalog, _) = catalog_with(&[("/assets/music/A/x.mp3", "Known")]);
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let cancel = CancellationToken::new();
        let pacer = Arc::new(RecordingPacer {
            sleeps: Mutex::new(Vec::new()),
            limit: 2,
            cancel: cancel.clone(),
        });
        let fixer = MetadataFixer::new(catalog, model.clone(), pacer.clone(), FixerConfig::default());

        fixer.run(cancel).await;

        assert!(model.prompts.lock().is_empty());
        assert_eq!(
            *pacer.sleeps.lock(),
            vec![Duration::from_secs(60), Duration::from_secs(60)]
        );
    }

    #[tokio::test]
    async fn stops_immediately_when_cancelled() {
        let (catalog, songs) = catalog_with(&[("/assets/music/A/x.mp3", UNKNOWN_ARTIST)]);
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fixer = MetadataFixer::new(
            catalog.clone(),
            model.clone(),
            Arc::new(TokioPacer),
            FixerConfig::default(),
        );

        start_metadata_fixer(fixer, cancel).await.unwrap();

        assert!(model.prompts.lock().is_empty());
        assert_eq!(
            catalog.get_song(songs[0].id).unwrap().unwrap().artist,
            UNKNOWN_ARTIST
        );
    }
}
