use std::collections::HashMap;

use common::Song;
use library::{Catalog, LibraryError};
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::external::TextModel;
use crate::utils::{first_json_array, strip_code_fences};

pub const FALLBACK_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecommendationSource {
    Model,
    Fallback,
}

#[derive(Clone, Debug)]
pub struct Recommendation {
    pub songs: Vec<Song>,
    pub source: RecommendationSource,
}

#[derive(Serialize)]
struct LibraryEntry<'a> {
    id: i64,
    title: &'a str,
    artist: &'a str,
    path: &'a str,
}

pub fn build_recommend_prompt(request: &str, songs: &[Song]) -> String {
    let entries: Vec<LibraryEntry<'_>> = songs
        .iter()
        .map(|song| LibraryEntry {
            id: song.id,
            title: &song.title,
            artist: &song.artist,
            path: &song.src,
        })
        .collect();
    let library = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Role: Precise Music Librarian.\n\
         User Request: \"{request}\"\n\
         \n\
         Library Data (List of Songs with Paths):\n\
         {library}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Analyze the 'path' field carefully. It contains the Genre/Language (e.g. 'Hindi', 'English', 'Rap').\n\
         2. IF the user explicitly asks for a Language/Genre (e.g. \"Hindi\", \"English\", \"Rap\"):\n\
         \x20  - You MUST ONLY select songs where that word appears in the 'path'.\n\
         \x20  - Do NOT include songs from other folders.\n\
         3. IF the user asks for a Vibe (e.g. \"Sad\", \"Party\"):\n\
         \x20  - Select songs based on Title/Artist vibes.\n\
         4. IF the request is \"Mixed\":\n\
         \x20  - Pick a variety.\n\
         \n\
         Output: Return ONLY a raw JSON array of Song IDs. Example: [2, 9, 14]"
    )
}

/// Pulls song ids out of a model reply. `None` when no array can be parsed;
/// entries that are not ids are skipped.
pub fn parse_id_list(reply: &str) -> Option<Vec<i64>> {
    let cleaned = strip_code_fences(reply);
    let array = first_json_array(&cleaned)?;
    let values: Vec<Value> = serde_json::from_str(array).ok()?;
    Some(
        values
            .iter()
            .filter_map(|value| match value {
                Value::Number(number) => number.as_i64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
            .collect(),
    )
}

pub fn random_sample(mut songs: Vec<Song>, count: usize) -> Vec<Song> {
    songs.shuffle(&mut rand::rng());
    songs.truncate(count);
    songs
}

/// Picks songs for a free-text request. Model failures of any kind end in a
/// random sample; only a catalog read failure is an error.
pub async fn recommend(
    catalog: &Catalog,
    model: Option<&dyn TextModel>,
    request: &str,
) -> Result<Recommendation, LibraryError> {
    let songs = catalog.list_songs()?;
    let Some(model) = model else {
        return Ok(fallback(songs));
    };

    let prompt = build_recommend_prompt(request, &songs);
    let ids = match model.generate(&prompt).await {
        Ok(reply) => match parse_id_list(&reply) {
            Some(ids) => ids,
            None => {
                warn!("Recommendation reply had no id list");
                Vec::new()
            }
        },
        Err(err) => {
            warn!("Recommendation model call failed: {}", err);
            Vec::new()
        }
    };

    let picked = pick_in_order(&songs, &ids);
    if picked.is_empty() {
        debug!("No recommended ids matched the catalog; using random songs");
        return Ok(fallback(songs));
    }
    Ok(Recommendation {
        songs: picked,
        source: RecommendationSource::Model,
    })
}

fn pick_in_order(songs: &[Song], ids: &[i64]) -> Vec<Song> {
    let by_id: HashMap<i64, &Song> = songs.iter().map(|song| (song.id, song)).collect();
    ids.iter()
        .filter_map(|id| by_id.get(id).map(|song| (*song).clone()))
        .collect()
}

fn fallback(songs: Vec<Song>) -> Recommendation {
    Recommendation {
        songs: random_sample(songs, FALLBACK_SIZE),
        source: RecommendationSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalError;
    use async_trait::async_trait;
    use common::NewSong;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel {
        reply: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(reply: Result<&str, u16>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextModel for FixedModel {
        async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
            assert!(prompt.contains("Precise Music Librarian"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(ExternalError::Status)
        }
    }

    fn catalog_with(count: usize) -> (Catalog, Vec<Song>) {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.init_tables().unwrap();
        let songs = (0..count)
            .map(|n| {
                catalog
                    .insert_song(&NewSong {
                        title: format!("Song {}", n),
                        artist: "Artist".to_string(),
                        src: format!("/assets/music/Mix/{}.mp3", n),
                        cover: common::DEFAULT_COVER.to_string(),
                    })
                    .unwrap()
            })
            .collect();
        (catalog, songs)
    }

    fn assert_valid_fallback(result: &Recommendation, catalog: &[Song]) {
        assert_eq!(result.source, RecommendationSource::Fallback);
        assert!(result.songs.len() <= FALLBACK_SIZE);
        let ids: HashSet<i64> = result.songs.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), result.songs.len());
        assert!(result.songs.iter().all(|s| catalog.contains(s)));
    }

    #[test]
    fn parses_ids_from_noisy_reply() {
        assert_eq!(
            parse_id_list("```json\n[3, \"9\", 1, null]\n```"),
            Some(vec![3, 9, 1])
        );
        assert_eq!(parse_id_list("Here you go: []"), Some(vec![]));
        assert_eq!(parse_id_list("no idea"), None);
        assert_eq!(parse_id_list("[1, 2"), None);
    }

    #[test]
    fn prompt_lists_song_paths() {
        let song = Song {
            id: 7,
            title: "Anthem".to_string(),
            artist: "Loud".to_string(),
            src: "/assets/music/Hindi/Loud - Anthem.mp3".to_string(),
            cover: common::DEFAULT_COVER.to_string(),
        };
        let prompt = build_recommend_prompt("hindi rap", &[song]);
        assert!(prompt.contains("User Request: \"hindi rap\""));
        assert!(prompt.contains(r#""path":"/assets/music/Hindi/Loud - Anthem.mp3""#));
        assert!(prompt.contains("Example: [2, 9, 14]"));
    }

    #[tokio::test]
    async fn keeps_model_order_and_drops_unknown_ids() {
        let (catalog, songs) = catalog_with(5);
        let reply = format!("[{}, 999, {}]", songs[3].id, songs[0].id);
        let model = FixedModel::new(Ok(&reply));

        let result = recommend(&catalog, Some(&model as &dyn TextModel), "anything").await.unwrap();
        assert_eq!(result.source, RecommendationSource::Model);
        assert_eq!(result.songs, vec![songs[3].clone(), songs[0].clone()]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_when_nothing_resolves() {
        let (catalog, songs) = catalog_with(15);
        let model = FixedModel::new(Ok("[12345]"));
        let result = recommend(&catalog, Some(&model as &dyn TextModel), "x").await.unwrap();
        assert_valid_fallback(&result, &songs);
        assert_eq!(result.songs.len(), FALLBACK_SIZE);
    }

    #[tokio::test]
    async fn falls_back_on_model_error() {
        let (catalog, songs) = catalog_with(3);
        let model = FixedModel::new(Err(500));
        let result = recommend(&catalog, Some(&model as &dyn TextModel), "x").await.unwrap();
        assert_valid_fallback(&result, &songs);
        assert_eq!(result.songs.len(), 3);
    }

    #[tokio::test]
    async fn without_model_never_calls_out() {
        let (catalog, songs) = catalog_with(12);
        let result = recommend(&catalog, None, "").await.unwrap();
        assert_valid_fallback(&result, &songs);

        let (empty, _) = catalog_with(0);
        let result = recommend(&empty, None, "").await.unwrap();
        assert!(result.songs.is_empty());
    }
}
