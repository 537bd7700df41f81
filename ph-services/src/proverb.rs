//! Proverb publishing, feeds and search.
//!
//! The `latest` and `popular` feeds are identical for every reader and are
//! cached per page; the `following` feed depends on the viewer and is always
//! computed. Viewer-specific flags are applied after the cache lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use ph_core::constants::validation;
use ph_core::error::{PhError, PhResult};
use ph_models::queries::{self, FeedFilter, ProverbView};
use ph_models::{Database, NewProverb, Profile, Proverb};

use crate::auth::AuthUser;
use crate::badge::BadgeService;
use crate::cache::{keys, CacheService, CacheTtl};
use crate::event_bus::{AppEvent, EventBus};
use crate::service::StateCell;
use crate::validate;

/// Client input for creating or editing a proverb.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProverbInput {
    pub content: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub meaning: Option<String>,
}

impl ProverbInput {
    fn validate(&self) -> PhResult<NewProverb> {
        Ok(NewProverb {
            content: validate::text(
                "content",
                &self.content,
                validation::PROVERB_MIN_LEN,
                validation::PROVERB_MAX_LEN,
            )?,
            origin: validate::optional_text("origin", self.origin.as_deref(), validation::ORIGIN_MAX_LEN)?,
            meaning: validate::optional_text("meaning", self.meaning.as_deref(), validation::MEANING_MAX_LEN)?,
        })
    }
}

/// One page of proverbs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProverbPage {
    pub items: Vec<ProverbView>,
    pub page: u32,
    pub has_more: bool,
}

pub struct ProverbService {
    pub(crate) state: StateCell,
    database: Database,
    cache: Arc<CacheService>,
    event_bus: EventBus,
    badges: Arc<BadgeService>,
}

impl ProverbService {
    pub fn new(database: Database, cache: Arc<CacheService>, event_bus: EventBus, badges: Arc<BadgeService>) -> Self {
        Self {
            state: StateCell::new(),
            database,
            cache,
            event_bus,
            badges,
        }
    }

    pub fn create(&self, user: &AuthUser, input: &ProverbInput) -> PhResult<ProverbView> {
        let new = input.validate()?;
        let proverb = {
            let conn = self.database.conn()?;
            Proverb::create(&conn, user.id, &new)?
        };

        info!("user {} published proverb {}", user.id, proverb.id);
        self.event_bus.emit(AppEvent::ProverbCreated {
            proverb_id: proverb.id,
            user_id: user.id,
        });
        self.badges.check_quietly(user.id);

        self.view(proverb.id, Some(user))
    }

    /// Edit a proverb. Only its author may do this.
    pub fn update(&self, user: &AuthUser, id: i64, input: &ProverbInput) -> PhResult<ProverbView> {
        let new = input.validate()?;
        {
            let conn = self.database.conn()?;
            let existing = Proverb::find_by_id(&conn, id)?.ok_or_else(|| PhError::not_found("proverb"))?;
            if existing.user_id != user.id {
                return Err(PhError::forbidden("only the author can edit this proverb"));
            }
            Proverb::update(&conn, id, &new)?.ok_or_else(|| PhError::not_found("proverb"))?;
        }

        self.event_bus.emit(AppEvent::ProverbUpdated { proverb_id: id });
        self.view(id, Some(user))
    }

    /// Delete a proverb. Allowed for its author and for admins.
    pub fn delete(&self, user: &AuthUser, id: i64) -> PhResult<()> {
        let conn = self.database.conn()?;
        let existing = Proverb::find_by_id(&conn, id)?.ok_or_else(|| PhError::not_found("proverb"))?;
        if existing.user_id != user.id && !user.is_admin() {
            return Err(PhError::forbidden("only the author can delete this proverb"));
        }
        Proverb::delete(&conn, id)?;
        drop(conn);

        info!("proverb {id} deleted by user {}", user.id);
        self.event_bus.emit(AppEvent::ProverbDeleted {
            proverb_id: id,
            by_user_id: user.id,
        });
        Ok(())
    }

    pub fn get(&self, id: i64, viewer: Option<&AuthUser>) -> PhResult<ProverbView> {
        self.view(id, viewer)
    }

    fn view(&self, id: i64, viewer: Option<&AuthUser>) -> PhResult<ProverbView> {
        let conn = self.database.conn()?;
        let mut view = queries::proverb_view(&conn, id)?.ok_or_else(|| PhError::not_found("proverb"))?;
        if let Some(viewer) = viewer {
            queries::apply_viewer_flags(&conn, viewer.id, std::slice::from_mut(&mut view))?;
        }
        Ok(view)
    }

    /// One feed page. `page` is 1-based.
    pub async fn feed(&self, viewer: Option<&AuthUser>, page: u32, filter: FeedFilter) -> PhResult<ProverbPage> {
        let (page, limit, offset) = validate::page(Some(page), None);

        let mut result = if filter.is_shared() {
            self.cache
                .remember(&keys::feed(page, filter.as_str()), CacheTtl::Feed, || async {
                    self.load_feed(filter, None, page, limit, offset)
                })
                .await?
        } else {
            let viewer = viewer.ok_or_else(PhError::unauthenticated)?;
            self.load_feed(filter, Some(viewer.id), page, limit, offset)?
        };

        if let Some(viewer) = viewer {
            let conn = self.database.conn()?;
            queries::apply_viewer_flags(&conn, viewer.id, &mut result.items)?;
        }
        Ok(result)
    }

    fn load_feed(&self, filter: FeedFilter, viewer: Option<i64>, page: u32, limit: i64, offset: i64) -> PhResult<ProverbPage> {
        let conn = self.database.conn()?;
        // One extra row tells us whether another page exists
        let mut items = queries::feed(&conn, filter, viewer, limit + 1, offset)?;
        Ok(paginate(&mut items, page, limit))
    }

    /// Proverbs by one author.
    pub fn by_user(&self, username: &str, page: Option<u32>, viewer: Option<&AuthUser>) -> PhResult<ProverbPage> {
        let (page, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        let author = Profile::find_by_username(&conn, username)?.ok_or_else(|| PhError::not_found("profile"))?;

        let mut items = queries::proverbs_by_user(&conn, author.id, limit + 1, offset)?;
        let mut result = paginate(&mut items, page, limit);
        if let Some(viewer) = viewer {
            queries::apply_viewer_flags(&conn, viewer.id, &mut result.items)?;
        }
        Ok(result)
    }

    pub fn search(&self, query: &str, page: Option<u32>, viewer: Option<&AuthUser>) -> PhResult<ProverbPage> {
        let query = validate::text("search query", query, 1, validation::SEARCH_MAX_LEN)?;
        let (page, limit, offset) = validate::page(page, None);

        let conn = self.database.conn()?;
        let mut items = queries::search_proverbs(&conn, &query, limit + 1, offset)?;
        let mut result = paginate(&mut items, page, limit);
        if let Some(viewer) = viewer {
            queries::apply_viewer_flags(&conn, viewer.id, &mut result.items)?;
        }
        Ok(result)
    }
}

fn paginate(items: &mut Vec<ProverbView>, page: u32, limit: i64) -> ProverbPage {
    let has_more = items.len() as i64 > limit;
    items.truncate(limit as usize);
    ProverbPage {
        items: std::mem::take(items),
        page,
        has_more,
    }
}

crate::impl_simple_service!(ProverbService, "proverbs");
