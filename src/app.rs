//! Composition root
//!
//! Constructs the token authority first, then the picker client and image
//! fetcher on top of it, then the rotation engine on top of the fetcher, and
//! passes references explicitly. No ambient singletons.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use photos_auth::{AuthState, HostOutcome, InteractionHost, TokenAuthority, Url};
use photos_picker::{
    BearerTokenProvider, FsBlobCache, ImageFetcher, Photo, PickerError, PickerSessionClient,
    TokenProviderError,
};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::database;
use crate::error::AppError;
use crate::models::Settings;
use crate::services::credential_service::SqliteCredentialStore;
use crate::services::display::GsettingsWallpaper;
use crate::services::rotation_engine::{RotationEngine, RotationHandle};
use crate::services::selection_service::{self, CachedSelection};
use crate::services::settings_service;

/// Adapts the token authority to the picker crate's per-call token contract
#[derive(Clone)]
pub struct AuthorityTokens {
    authority: Arc<TokenAuthority<SqliteCredentialStore>>,
}

impl BearerTokenProvider for AuthorityTokens {
    fn bearer_token(&self) -> impl Future<Output = Result<String, TokenProviderError>> + Send {
        async move {
            self.authority
                .refresh_token_if_needed()
                .await
                .map_err(|e| TokenProviderError(e.to_string()))
        }
    }
}

/// The wired application
pub struct App {
    config: AppConfig,
    conn: Arc<Mutex<Connection>>,
    authority: Arc<TokenAuthority<SqliteCredentialStore>>,
    picker: PickerSessionClient<AuthorityTokens>,
    fetcher: Arc<ImageFetcher<AuthorityTokens, FsBlobCache>>,
    rotation: RotationHandle,
}

impl App {
    pub fn bootstrap(config: AppConfig) -> Result<Self, AppError> {
        let conn = database::open_database(&config.storage.database_path())?;
        let conn = Arc::new(Mutex::new(conn));

        let store = SqliteCredentialStore::new(conn.clone());
        let authority = Arc::new(TokenAuthority::new(config.oauth.clone(), store)?);
        authority.initialize()?;

        let tokens = AuthorityTokens {
            authority: authority.clone(),
        };
        let picker = PickerSessionClient::new(config.picker.base_url.clone(), tokens.clone())?;
        let cache = FsBlobCache::new(config.storage.image_cache_dir())?;
        let fetcher = Arc::new(ImageFetcher::new(tokens, cache)?);
        let rotation = RotationEngine::spawn(fetcher.clone(), GsettingsWallpaper);

        Ok(Self {
            config,
            conn,
            authority,
            picker,
            fetcher,
            rotation,
        })
    }

    pub fn auth_state(&self) -> AuthState {
        self.authority.current_state()
    }

    pub fn rotation(&self) -> &RotationHandle {
        &self.rotation
    }

    pub async fn sign_in<H: InteractionHost>(&self, host: &H) -> Result<(), AppError> {
        self.authority.sign_in(host).await?;
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.authority.sign_out().await?;
        Ok(())
    }

    /// Create a picker session, hand its URI to the browser surface and wait
    /// for the user to finish selecting.
    ///
    /// The poll loop and the interactive surface race each other: if the
    /// user dismisses the surface before the session reports media, the flow
    /// ends with [`PickerError::UserCancelled`].
    pub async fn run_selection_flow<H: InteractionHost>(
        &self,
        host: &H,
    ) -> Result<Vec<Photo>, AppError> {
        let session = self
            .picker
            .create_session(self.config.picker.max_item_count)
            .await?;
        let picker_uri = session.picker_uri.clone().ok_or_else(|| {
            AppError::Picker(PickerError::InvalidResponse(
                "session carried no picker URI".to_string(),
            ))
        })?;
        let url = Url::parse(&picker_uri).map_err(|e| {
            AppError::Picker(PickerError::InvalidResponse(format!(
                "bad picker URI: {}",
                e
            )))
        })?;

        log::info!("Waiting for photo selection in session {}", session.id);
        let selection = self.picker.wait_for_selection(&session.id);
        tokio::pin!(selection);
        let presentation = host.present_url(url, "");
        tokio::pin!(presentation);

        tokio::select! {
            photos = &mut selection => Ok(photos?),
            outcome = &mut presentation => match outcome {
                Ok(HostOutcome::Dismissed) | Ok(HostOutcome::Callback(_)) => {
                    // The user closed the surface; check the session one last
                    // time in case selection completed right before.
                    let current = self.picker.get_session(&session.id).await?;
                    if current.media_ready {
                        Ok(self.picker.fetch_media_items(&session.id).await?)
                    } else {
                        Err(AppError::Picker(PickerError::UserCancelled))
                    }
                }
                Err(e) => Err(AppError::Picker(PickerError::InvalidResponse(format!(
                    "browser surface failed: {}",
                    e
                )))),
            },
        }
    }

    pub fn cached_selection(&self) -> Result<Option<CachedSelection>, AppError> {
        let conn = self.lock_conn()?;
        selection_service::load_selection(&conn)
    }

    pub fn store_selection(&self, photos: &[Photo]) -> Result<(), AppError> {
        let mut conn = self.lock_conn()?;
        selection_service::replace_selection(&mut conn, photos)
    }

    pub fn clear_selection(&self) -> Result<(), AppError> {
        let conn = self.lock_conn()?;
        selection_service::clear_selection(&conn)
    }

    pub fn settings(&self) -> Result<Settings, AppError> {
        let conn = self.lock_conn()?;
        settings_service::load_settings_or_default(&conn)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), AppError> {
        let conn = self.lock_conn()?;
        settings_service::save_settings(&conn, settings)
    }

    /// Size of the local image cache, for the settings surface
    pub fn image_cache_size_bytes(&self) -> u64 {
        use photos_picker::BlobCache;
        self.fetcher.cache().total_size_bytes()
    }

    /// Drop every cached image (explicit user action)
    pub fn clear_image_cache(&self) -> Result<(), AppError> {
        use photos_picker::BlobCache;
        self.fetcher.cache().clear()?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Other("database lock poisoned".to_string()))
    }
}
