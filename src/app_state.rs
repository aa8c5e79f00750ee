use std::sync::Arc;

use crate::{
    config::Config,
    database::SocialDatabase,
    feed::FeedAssembler,
    toggle::ToggleEngine,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SocialDatabase>,
    pub toggles: ToggleEngine,
    pub feed: FeedAssembler,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = SocialDatabase::new(&config.database.url).await?;
        database.init().await?;
        let db = Arc::new(database);

        Ok(Self {
            toggles: ToggleEngine::new(db.clone()),
            feed: FeedAssembler::new(db.clone()),
            db,
            config,
        })
    }
}
