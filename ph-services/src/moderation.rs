//! Reports, bans and roles.
//!
//! Filing a report is open to any signed-in user. Everything else here is
//! admin-only and leaves a row in the security audit trail.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use ph_core::constants::validation;
use ph_core::error::{PhError, PhResult};
use ph_models::{Database, NotificationKind, Profile, Proverb, Report, ReportStatus, Session};

use crate::audit::{events, AuditService};
use crate::auth::{AuthService, AuthUser};
use crate::event_bus::{AppEvent, EventBus};
use crate::notification::NotificationService;
use crate::service::StateCell;
use crate::validate;

/// What a moderator does with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    /// Close the report and keep the proverb.
    Dismiss,
    /// Close the report and delete the proverb.
    Remove,
}

impl FromStr for ReportAction {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dismiss" => Ok(Self::Dismiss),
            "remove" => Ok(Self::Remove),
            other => Err(PhError::validation(format!("unknown report action: {other}"))),
        }
    }
}

pub struct ModerationService {
    pub(crate) state: StateCell,
    database: Database,
    auth: Arc<AuthService>,
    audit: Arc<AuditService>,
    event_bus: EventBus,
    notifications: Arc<NotificationService>,
}

impl ModerationService {
    pub fn new(
        database: Database,
        auth: Arc<AuthService>,
        audit: Arc<AuditService>,
        event_bus: EventBus,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            state: StateCell::new(),
            database,
            auth,
            audit,
            event_bus,
            notifications,
        }
    }

    /// File a report. A user may hold only one open report per proverb.
    pub fn report_proverb(&self, user: &AuthUser, proverb_id: i64, reason: &str) -> PhResult<Report> {
        let reason = validate::text("reason", reason, 1, validation::REPORT_REASON_MAX_LEN)?;
        let conn = self.database.conn()?;
        if Proverb::find_by_id(&conn, proverb_id)?.is_none() {
            return Err(PhError::not_found("proverb"));
        }
        let report = Report::create(&conn, user.id, proverb_id, &reason)
            .map_err(|e| match e {
                PhError::Conflict(_) => PhError::Conflict("you have already reported this proverb".into()),
                other => other,
            })?;
        drop(conn);

        info!("report {} filed against proverb {proverb_id}", report.id);
        self.event_bus.emit(AppEvent::ReportFiled {
            report_id: report.id,
            proverb_id,
        });
        Ok(report)
    }

    pub fn list_reports(&self, admin: &AuthUser, status: Option<ReportStatus>, page: Option<u32>) -> PhResult<Vec<Report>> {
        self.auth.require_admin(admin)?;
        let (_, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        Report::list(&conn, status, limit, offset)
    }

    /// Close an open report, deleting the proverb when the action is
    /// [`ReportAction::Remove`].
    pub fn resolve_report(&self, admin: &AuthUser, report_id: i64, action: ReportAction) -> PhResult<Report> {
        self.auth.require_admin(admin)?;

        let status = match action {
            ReportAction::Dismiss => ReportStatus::Dismissed,
            ReportAction::Remove => ReportStatus::Removed,
        };

        let (report, removed_owner) = self.database.transaction(|conn| {
            let report = Report::find_by_id(conn, report_id)?.ok_or_else(|| PhError::not_found("report"))?;
            if !Report::resolve(conn, report_id, status, admin.id)? {
                return Err(PhError::Conflict("report is already resolved".into()));
            }

            let mut removed_owner = None;
            if action == ReportAction::Remove {
                if let Some(proverb_id) = report.proverb_id {
                    if let Some(proverb) = Proverb::find_by_id(conn, proverb_id)? {
                        Proverb::delete(conn, proverb_id)?;
                        removed_owner = Some((proverb.user_id, proverb_id));
                    }
                }
            }

            let report = Report::find_by_id(conn, report_id)?.ok_or_else(|| PhError::not_found("report"))?;
            Ok((report, removed_owner))
        })?;

        info!("report {report_id} resolved as {} by {}", status.as_str(), admin.username);
        self.event_bus.emit(AppEvent::ReportResolved {
            report_id,
            status: status.as_str().to_string(),
        });
        if let Some((owner_id, proverb_id)) = removed_owner {
            self.event_bus.emit(AppEvent::ProverbDeleted {
                proverb_id,
                by_user_id: admin.id,
            });
            self.notifications.notify(
                owner_id,
                None,
                NotificationKind::Moderation,
                None,
                Some("One of your proverbs was removed by a moderator"),
            );
        }
        Ok(report)
    }

    /// Ban or unban a user. Banning also revokes every session they hold.
    pub fn set_banned(&self, admin: &AuthUser, user_id: i64, banned: bool) -> PhResult<()> {
        self.auth.require_admin(admin)?;
        if admin.id == user_id {
            return Err(PhError::validation("you cannot ban yourself"));
        }
        self.apply_ban(user_id, banned, json!(admin.id))?;
        info!("user {user_id} banned={banned} by {}", admin.username);
        Ok(())
    }

    pub fn set_role(&self, admin: &AuthUser, user_id: i64, role: &str) -> PhResult<()> {
        self.auth.require_admin(admin)?;
        self.apply_role(user_id, role, json!(admin.id))
    }

    /// Ban or unban from the operator console, which has no session.
    pub fn set_banned_by_operator(&self, user_id: i64, banned: bool) -> PhResult<()> {
        self.apply_ban(user_id, banned, json!("console"))?;
        info!("user {user_id} banned={banned} from console");
        Ok(())
    }

    /// Change a role from the operator console.
    pub fn set_role_by_operator(&self, user_id: i64, role: &str) -> PhResult<()> {
        self.apply_role(user_id, role, json!("console"))
    }

    fn apply_ban(&self, user_id: i64, banned: bool, by: Value) -> PhResult<()> {
        let revoked = self.database.transaction(|conn| {
            if !Profile::set_banned(conn, user_id, banned)? {
                return Err(PhError::not_found("profile"));
            }
            if banned {
                Session::delete_for_user_except(conn, user_id, None)
            } else {
                Ok(0)
            }
        })?;

        let event = if banned { events::USER_BANNED } else { events::USER_UNBANNED };
        self.audit.security_event(
            Some(user_id),
            event,
            None,
            Some(json!({ "by": by, "revokedSessions": revoked })),
        );
        self.event_bus.emit(AppEvent::UserBanChanged { user_id, banned });
        Ok(())
    }

    fn apply_role(&self, user_id: i64, role: &str, by: Value) -> PhResult<()> {
        let conn = self.database.conn()?;
        if !Profile::set_role(&conn, user_id, role)? {
            return Err(PhError::not_found("profile"));
        }
        drop(conn);

        self.audit.security_event(
            Some(user_id),
            events::ROLE_CHANGED,
            None,
            Some(json!({ "by": by, "role": role })),
        );
        Ok(())
    }
}

crate::impl_simple_service!(ModerationService, "moderation");
