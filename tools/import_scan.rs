use std::env;
use std::path::{Path, PathBuf};

use library::Catalog;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let assets_dir = args
        .next()
        .or_else(|| env::var("RHYMIC_ASSETS").ok())
        .unwrap_or_else(|| "rhymic-react/public/assets".to_string());
    let database_url = args
        .next()
        .or_else(|| env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:///site.db".to_string());

    let catalog = Catalog::open_url(&database_url, Path::new("."))?;
    catalog.init_tables()?;
    catalog.ensure_profile_pic_column()?;
    let stats = catalog.scan_library(&PathBuf::from(&assets_dir))?;

    println!(
        "Scanned {} folders: {} songs seen, {} added, {} playlists added, {} links added",
        stats.folders, stats.songs_seen, stats.songs_added, stats.playlists_added, stats.links_added
    );

    Ok(())
}
