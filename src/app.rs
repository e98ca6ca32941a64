use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config;
use crate::feed::{Feed, PostSeed};
use crate::media;
use crate::nav::Route;
use crate::session::{self, Identity};
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let store = session::Store::open(session::Options {
        path: cfg.session.path.clone(),
    })
    .context("open session store")?;
    store
        .purge_stale(cfg.session.ttl)
        .context("purge stale session values")?;

    let identity = Identity::from_stored(
        store
            .display_name()
            .context("read session display name")?
            .as_deref(),
        &cfg.feed.default_display_name,
    );

    let seeds = load_seeds(cfg.feed.seed_file.as_deref())?;
    let feed = Feed::seeded(seeds, &identity);

    // Attachment staging is optional: without a usable stage dir the
    // composer simply posts without media.
    let stager = media::Stager::new(media::Config {
        stage_dir: cfg.media.stage_dir.clone(),
    })
    .ok();

    let open_composer = store.take_compose_flag().context("read composer flag")?;

    let status = format!(
        "Signed in as {}. Press n to share a post, q to quit.",
        identity.display()
    );

    let options = ui::Options {
        status_message: status,
        identity,
        feed,
        store,
        stager,
        config_path: display_path,
        density: ui::Density::from_key(&cfg.ui.density),
        route: Route::Community,
        open_composer,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn load_seeds(path: Option<&Path>) -> Result<Vec<PostSeed>> {
    let Some(path) = path else {
        return Ok(builtin_seeds());
    };
    if !path.exists() {
        return Ok(builtin_seeds());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("read seed file {}", path.display()))?;
    serde_yaml::from_str(&data)
        .with_context(|| format!("parse seed file {}", path.display()))
}

fn builtin_seeds() -> Vec<PostSeed> {
    vec![
        PostSeed {
            author: "@AdminUser".into(),
            title: "Welcome to the community feed".into(),
            caption: Some("Share your runs, rides, lifts, and meals with everyone here.".into()),
            likes: Some("❤ 12".into()),
            views: Some("👁 131".into()),
            ..Default::default()
        },
        PostSeed {
            author: "@trail_mix".into(),
            title: "Sunday long run, 18k".into(),
            caption: Some("Negative splits for the first time this year.".into()),
            likes: Some("❤ 7".into()),
            views: Some("👁 54".into()),
            ..Default::default()
        },
        PostSeed {
            author: "@ironbound".into(),
            title: "Meal prep for the week".into(),
            likes: Some("❤ 3".into()),
            views: Some("👁 29".into()),
            ..Default::default()
        },
    ]
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/fitfeed/config.yaml".to_string()
    }
}
