//! Account service - user lifecycle recorded in `account_history`

use crate::context::ServiceContext;
use crate::error::ServiceResult;
use crate::writer::Justification;
use chrono::Utc;
use ledgerseal_guard::AuthorizationHeaders;
use ledgerseal_ledger::{Action, LedgerError, LedgerKind, LedgerRecord, User, UserStatus};
use ledgerseal_store::{Mutation, UserRepo};

const SUBSYSTEM: &str = "accounts";

/// User account operations. Destructive ones pass the dual-control guard first.
pub struct AccountService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<User> {
        Ok(UserRepo::get(self.ctx.db().pool(), user_id).await?)
    }

    /// Insert a user and its `create` record
    pub async fn create_user(
        &self,
        user: User,
        why: &Justification,
    ) -> ServiceResult<(User, LedgerRecord)> {
        user.validate()?;

        let mut draft = why
            .draft(&user.id, Action::Create)
            .subsystem(SUBSYSTEM)
            .detail("email", user.email.as_str())
            .detail("display_name", user.display_name.as_str());
        if let Some(region) = &user.region {
            draft = draft.region(region.as_str());
        }

        let record = self
            .ctx
            .writer()
            .commit(
                LedgerKind::AccountHistory,
                draft,
                Some(Mutation::InsertUser(user.clone())),
            )
            .await?;
        Ok((user, record))
    }

    /// Overwrite profile fields and record a `modify`
    pub async fn update_user(
        &self,
        mut user: User,
        why: &Justification,
    ) -> ServiceResult<(User, LedgerRecord)> {
        user.validate()?;
        let current = self.get_user(&user.id).await?;

        // Status and creation time are not editable here
        user.status = current.status;
        user.created_at = current.created_at;
        user.updated_at = Utc::now();

        let mut draft = why.draft(&user.id, Action::Modify).subsystem(SUBSYSTEM);
        if current.email != user.email {
            draft = draft.detail("email", user.email.as_str());
        }
        if current.display_name != user.display_name {
            draft = draft.detail("display_name", user.display_name.as_str());
        }
        if current.region != user.region {
            draft = draft.detail("region_changed", true);
        }
        if let Some(region) = &user.region {
            draft = draft.region(region.as_str());
        }

        let record = self
            .ctx
            .writer()
            .commit(
                LedgerKind::AccountHistory,
                draft,
                Some(Mutation::UpdateUser(user.clone())),
            )
            .await?;
        Ok((user, record))
    }

    /// Guarded: mark a user deactivated
    pub async fn deactivate_user(
        &self,
        headers: &AuthorizationHeaders,
        user_id: &str,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        // 1. Dual control before anything else
        let authorization = self.ctx.authorize(headers, Action::Deactivate, user_id)?;

        // 2. Only active users can be deactivated; repeated inside the write transaction
        let user = self.get_user(user_id).await?;
        if user.status != UserStatus::Active {
            return Err(LedgerError::InvalidTransition {
                from: user.status.to_string(),
                to: UserStatus::Deactivated.to_string(),
            }
            .into());
        }

        // 3. Status change + record, one transaction
        let mut draft = why.draft(user_id, Action::Deactivate).subsystem(SUBSYSTEM);
        if let Some(region) = &user.region {
            draft = draft.region(region.as_str());
        }
        let mutation = Mutation::SetUserStatus {
            id: user_id.to_string(),
            from: UserStatus::Active,
            to: UserStatus::Deactivated,
            at: Utc::now(),
        };

        self.ctx
            .writer()
            .commit_authorized(&authorization, LedgerKind::AccountHistory, draft, Some(mutation))
            .await
    }

    /// Guarded: remove the user row. Its history stays in the ledger.
    pub async fn delete_user(
        &self,
        headers: &AuthorizationHeaders,
        user_id: &str,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        // 1. Dual control before anything else
        let authorization = self.ctx.authorize(headers, Action::Delete, user_id)?;

        // 2. Must exist
        let user = self.get_user(user_id).await?;

        // 3. Delete + record, one transaction
        let mut draft = why
            .draft(user_id, Action::Delete)
            .subsystem(SUBSYSTEM)
            .detail("email", user.email.as_str());
        if let Some(region) = &user.region {
            draft = draft.region(region.as_str());
        }
        let mutation = Mutation::DeleteUser {
            id: user_id.to_string(),
        };

        self.ctx
            .writer()
            .commit_authorized(&authorization, LedgerKind::AccountHistory, draft, Some(mutation))
            .await
    }
}
