use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::session::Identity;

pub const ICON_LIKES: &str = "❤";
pub const ICON_VIEWS: &str = "👁";

static COUNTER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+(.*)$").expect("counter label pattern")
});

/// Pull the count out of a `"<icon> <count>"` label. Anything that does
/// not parse as a non-negative integer reads as zero.
pub fn parse_counter_label(label: &str) -> u64 {
    COUNTER_LABEL
        .captures(label)
        .and_then(|caps| caps.get(2))
        .and_then(|count| count.as_str().trim().parse::<u64>().ok())
        .unwrap_or(0)
}

pub fn counter_label(icon: &str, count: u64) -> String {
    format!("{icon} {count}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Mine,
}

impl FilterMode {
    pub fn label(self) -> &'static str {
        match self {
            FilterMode::All => "All Posts",
            FilterMode::Mine => "My Posts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub source: PathBuf,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: PostId,
    pub author: String,
    pub title: String,
    pub caption: Option<String>,
    pub media: Option<MediaRef>,
    pub likes: u64,
    pub views: u64,
    pub liked: bool,
    pub mine: bool,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn likes_label(&self) -> String {
        counter_label(ICON_LIKES, self.likes)
    }

    pub fn views_label(&self) -> String {
        counter_label(ICON_VIEWS, self.views)
    }
}

/// A post as it appears in a seed file. Counters are stored in display
/// form, the same `"<icon> <count>"` text the UI shows.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PostSeed {
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media: Option<PathBuf>,
    #[serde(default)]
    pub media_label: Option<String>,
    #[serde(default)]
    pub likes: Option<String>,
    #[serde(default)]
    pub views: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub caption: String,
    pub media: Option<MediaRef>,
}

#[derive(Debug, Default)]
pub struct Feed {
    posts: Vec<Post>,
    mode: FilterMode,
    next_id: u64,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the feed from seed posts, tagging ownership against the
    /// viewer the same way new submissions are tagged.
    pub fn seeded(seeds: Vec<PostSeed>, viewer: &Identity) -> Self {
        let mut feed = Self::new();
        for seed in seeds {
            let author = seed.author.trim().to_string();
            if author.is_empty() || seed.title.trim().is_empty() {
                continue;
            }
            let id = feed.allocate_id();
            let media = seed.media.map(|source| {
                let label = seed
                    .media_label
                    .clone()
                    .unwrap_or_else(|| display_name_for(&source));
                MediaRef { source, label }
            });
            feed.posts.push(Post {
                id,
                mine: viewer.owns(&author),
                author,
                title: seed.title.trim().to_string(),
                caption: seed
                    .caption
                    .as_deref()
                    .map(str::trim)
                    .filter(|caption| !caption.is_empty())
                    .map(str::to_string),
                media,
                likes: seed.likes.as_deref().map(parse_counter_label).unwrap_or(0),
                views: seed.views.as_deref().map(parse_counter_label).unwrap_or(0),
                liked: false,
                created_at: Utc::now(),
            });
        }
        feed
    }

    fn allocate_id(&mut self) -> PostId {
        self.next_id += 1;
        PostId(self.next_id)
    }

    /// Prepend a new post owned by the viewer. Returns `None` without
    /// touching the feed when the title is blank.
    pub fn submit(&mut self, draft: PostDraft, viewer: &Identity) -> Option<PostId> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let caption = draft.caption.trim();
        let id = self.allocate_id();
        let post = Post {
            id,
            author: viewer.display().to_string(),
            title,
            caption: if caption.is_empty() {
                None
            } else {
                Some(caption.to_string())
            },
            media: draft.media,
            likes: 0,
            views: 0,
            liked: false,
            mine: true,
            created_at: Utc::now(),
        };
        self.posts.insert(0, post);
        Some(id)
    }

    /// Flip the liked state, moving the count by one in either direction
    /// and never below zero. Returns the new label, or `None` for an
    /// unknown post.
    pub fn toggle_like(&mut self, id: PostId) -> Option<String> {
        let post = self.posts.iter_mut().find(|post| post.id == id)?;
        if post.liked {
            post.liked = false;
            post.likes = post.likes.saturating_sub(1);
        } else {
            post.liked = true;
            post.likes = post.likes.saturating_add(1);
        }
        Some(post.likes_label())
    }

    pub fn remove(&mut self, id: PostId) -> Option<Post> {
        let index = self.posts.iter().position(|post| post.id == id)?;
        Some(self.posts.remove(index))
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    /// Indices into `posts()` that the active filter leaves visible.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.posts
            .iter()
            .enumerate()
            .filter(|(_, post)| match self.mode {
                FilterMode::All => true,
                FilterMode::Mine => post.mine,
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

fn display_name_for(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> Identity {
        Identity::from_stored(Some("AdminUser"), "AdminUser")
    }

    fn seeds() -> Vec<PostSeed> {
        vec![
            PostSeed {
                author: "@AdminUser".into(),
                title: "Morning run recap".into(),
                likes: Some("❤ 12".into()),
                views: Some("👁 48".into()),
                ..Default::default()
            },
            PostSeed {
                author: "@trail_mix".into(),
                title: "Hill repeats".into(),
                caption: Some("Six rounds, legs gone.".into()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn parse_counter_label_reads_count() {
        assert_eq!(parse_counter_label("❤ 12"), 12);
        assert_eq!(parse_counter_label("👁 0"), 0);
    }

    #[test]
    fn parse_counter_label_treats_garbage_as_zero() {
        assert_eq!(parse_counter_label("❤ twelve"), 0);
        assert_eq!(parse_counter_label("❤"), 0);
        assert_eq!(parse_counter_label(""), 0);
        assert_eq!(parse_counter_label("❤ -3"), 0);
    }

    #[test]
    fn toggle_twice_restores_count() {
        for start in [0u64, 1, 12, 999] {
            let mut feed = Feed::seeded(
                vec![PostSeed {
                    author: "@trail_mix".into(),
                    title: "Hill repeats".into(),
                    likes: Some(counter_label(ICON_LIKES, start)),
                    ..Default::default()
                }],
                &viewer(),
            );
            let id = feed.posts()[0].id;
            feed.toggle_like(id);
            assert_eq!(feed.get(id).unwrap().likes, start + 1);
            feed.toggle_like(id);
            assert_eq!(feed.get(id).unwrap().likes, start);
        }
    }

    #[test]
    fn unlike_never_goes_below_zero() {
        let mut feed = Feed::seeded(
            vec![PostSeed {
                author: "@trail_mix".into(),
                title: "Hill repeats".into(),
                likes: Some("❤ not-a-number".into()),
                ..Default::default()
            }],
            &viewer(),
        );
        let id = feed.posts()[0].id;
        // Malformed seed label reads as zero; rapid toggling from there
        // must stay non-negative.
        for _ in 0..7 {
            feed.toggle_like(id);
            assert!(feed.get(id).unwrap().likes <= 1);
        }
        assert_eq!(feed.get(id).unwrap().likes, 1);
        feed.toggle_like(id);
        assert_eq!(feed.get(id).unwrap().likes, 0);
    }

    #[test]
    fn filter_mine_shows_exactly_owned_posts() {
        let mut feed = Feed::seeded(seeds(), &viewer());
        feed.set_mode(FilterMode::Mine);
        let visible = feed.visible_indices();
        assert_eq!(visible.len(), 1);
        assert!(feed.posts()[visible[0]].mine);

        feed.set_mode(FilterMode::All);
        assert_eq!(feed.visible_indices().len(), feed.len());
    }

    #[test]
    fn submit_with_blank_title_is_refused() {
        let mut feed = Feed::seeded(seeds(), &viewer());
        let before = feed.len();
        let result = feed.submit(
            PostDraft {
                title: "   ".into(),
                caption: "does not matter".into(),
                media: None,
            },
            &viewer(),
        );
        assert!(result.is_none());
        assert_eq!(feed.len(), before);
    }

    #[test]
    fn submit_prepends_owned_post_with_zero_counters() {
        let mut feed = Feed::seeded(seeds(), &viewer());
        let before = feed.len();
        let id = feed
            .submit(
                PostDraft {
                    title: "New PR on deadlifts".into(),
                    caption: String::new(),
                    media: None,
                },
                &viewer(),
            )
            .unwrap();
        assert_eq!(feed.len(), before + 1);
        let first = &feed.posts()[0];
        assert_eq!(first.id, id);
        assert_eq!(first.author, "@AdminUser");
        assert!(first.mine);
        assert_eq!(first.likes, 0);
        assert_eq!(first.views, 0);
        assert_eq!(first.caption, None);
    }

    #[test]
    fn remove_deletes_exactly_one_post() {
        let mut feed = Feed::seeded(seeds(), &viewer());
        let before = feed.len();
        let id = feed.posts()[1].id;
        let removed = feed.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(feed.len(), before - 1);
        assert!(feed.get(id).is_none());
        assert!(feed.remove(id).is_none());
    }

    #[test]
    fn seed_counters_parse_from_labels() {
        let feed = Feed::seeded(seeds(), &viewer());
        assert_eq!(feed.posts()[0].likes, 12);
        assert_eq!(feed.posts()[0].views, 48);
        assert_eq!(feed.posts()[1].likes, 0);
    }

    #[test]
    fn seed_ownership_matches_viewer() {
        let feed = Feed::seeded(seeds(), &viewer());
        assert!(feed.posts()[0].mine);
        assert!(!feed.posts()[1].mine);
    }
}
