// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::SkillrunError;
use crate::types::User;

/// Resolves invoking users.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, SkillrunError>;
}
