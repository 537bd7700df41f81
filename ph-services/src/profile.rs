//! Profiles, stats and the leaderboard.
//!
//! Reads go through the cache with the per-category TTLs. Updates do not
//! clear cached entries; readers may see the old profile until it expires.

use std::sync::Arc;

use serde::Serialize;

use ph_core::constants::{validation, DEFAULT_LEADERBOARD_SIZE, MAX_PAGE_SIZE};
use ph_core::error::{PhError, PhResult};
use ph_models::models::engagement::{self, PairTable};
use ph_models::queries::{self, LeaderboardEntry, UserStats};
use ph_models::{AwardedBadge, Database, Profile, ProfileUpdate, PublicProfile};

use crate::auth::AuthUser;
use crate::badge::BadgeService;
use crate::cache::{keys, CacheService, CacheTtl};
use crate::rate_limit::{Limiter, RateLimiter};
use crate::service::StateCell;
use crate::validate;

/// Everything shown on a profile page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage {
    pub profile: PublicProfile,
    pub stats: UserStats,
    pub badges: Vec<AwardedBadge>,
    /// Whether the viewer follows this profile.
    pub is_following: bool,
}

pub struct ProfileService {
    pub(crate) state: StateCell,
    database: Database,
    cache: Arc<CacheService>,
    limiter: Arc<RateLimiter>,
    badges: Arc<BadgeService>,
}

impl ProfileService {
    pub fn new(
        database: Database,
        cache: Arc<CacheService>,
        limiter: Arc<RateLimiter>,
        badges: Arc<BadgeService>,
    ) -> Self {
        Self {
            state: StateCell::new(),
            database,
            cache,
            limiter,
            badges,
        }
    }

    /// Public profile by username (case-insensitive), cached.
    pub async fn get_profile(&self, username: &str) -> PhResult<PublicProfile> {
        let key = keys::profile(username);
        self.cache
            .remember(&key, CacheTtl::Profile, || async {
                let conn = self.database.conn()?;
                let profile = Profile::find_by_username(&conn, username)?
                    .ok_or_else(|| PhError::not_found("profile"))?;
                Ok(PublicProfile::from(&profile))
            })
            .await
    }

    /// Profile, stats, badges and follow state in one call.
    pub async fn profile_page(&self, username: &str, viewer: Option<&AuthUser>) -> PhResult<ProfilePage> {
        let profile = self.get_profile(username).await?;
        let stats = self.user_stats(profile.id).await?;
        let badges = self.badges.list_for_user(profile.id)?;

        let is_following = match viewer {
            Some(v) if v.id != profile.id => {
                let conn = self.database.conn()?;
                engagement::exists(&conn, PairTable::Follows, v.id, profile.id)?
            }
            _ => false,
        };

        Ok(ProfilePage { profile, stats, badges, is_following })
    }

    /// Update the caller's own profile.
    pub async fn update_profile(&self, user: &AuthUser, input: &ProfileUpdate) -> PhResult<PublicProfile> {
        self.limiter.enforce(&user.id.to_string(), Limiter::ProfileUpdate).await?;

        if input.is_empty() {
            return Err(PhError::validation("nothing to update"));
        }
        if let Some(name) = &input.display_name {
            validate::optional_text("display name", Some(name.as_str()), validation::DISPLAY_NAME_MAX_LEN)?;
        }
        if let Some(bio) = &input.bio {
            validate::optional_text("bio", Some(bio.as_str()), validation::BIO_MAX_LEN)?;
        }
        if let Some(url) = &input.avatar_url {
            validate::optional_url("avatar URL", url)?;
        }
        if let Some(url) = &input.website {
            validate::optional_url("website", url)?;
        }

        let conn = self.database.conn()?;
        let updated = Profile::apply_update(&conn, user.id, input)?;
        Ok(PublicProfile::from(&updated))
    }

    pub async fn user_stats(&self, user_id: i64) -> PhResult<UserStats> {
        self.cache
            .remember(&keys::user_stats(user_id), CacheTtl::UserStats, || async {
                let conn = self.database.conn()?;
                queries::user_stats(&conn, user_id)
            })
            .await
    }

    pub async fn leaderboard(&self, limit: Option<i64>) -> PhResult<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.cache
            .remember(&keys::leaderboard(limit), CacheTtl::Leaderboard, || async {
                let conn = self.database.conn()?;
                queries::leaderboard(&conn, limit)
            })
            .await
    }

    pub fn followers(&self, username: &str, page: Option<u32>) -> PhResult<Vec<PublicProfile>> {
        let (_, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        let profile = Profile::find_by_username(&conn, username)?.ok_or_else(|| PhError::not_found("profile"))?;
        queries::followers(&conn, profile.id, limit, offset)
    }

    pub fn following(&self, username: &str, page: Option<u32>) -> PhResult<Vec<PublicProfile>> {
        let (_, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        let profile = Profile::find_by_username(&conn, username)?.ok_or_else(|| PhError::not_found("profile"))?;
        queries::following(&conn, profile.id, limit, offset)
    }
}

crate::impl_simple_service!(ProfileService, "profiles");
