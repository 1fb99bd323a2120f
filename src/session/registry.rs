// どのユーザが対話型メニューを操作中かを管理するモジュール
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serenity::model::prelude::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    BugReport,
    ApplicationConfig,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<UserId, MenuKind>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, MenuKind>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `user` as occupied by `kind`. Returns `None` while the user is already in a menu.
    #[tracing::instrument(skip(self))]
    pub fn try_enter(&self, user: UserId, kind: MenuKind) -> Option<RegistryGuard> {
        let mut entries = self.lock();
        if let Some(current) = entries.get(&user) {
            tracing::debug!(?current, "user is already in a menu");
            return None;
        }
        entries.insert(user, kind);

        Some(RegistryGuard {
            registry: self.clone(),
            user,
        })
    }

    pub fn current(&self, user: UserId) -> Option<MenuKind> {
        self.lock().get(&user).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps the user registered until dropped.
pub struct RegistryGuard {
    registry: SessionRegistry,
    user: UserId,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_second_entry_until_guard_drops() {
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        let guard = registry.try_enter(user, MenuKind::BugReport).unwrap();
        assert_eq!(registry.current(user), Some(MenuKind::BugReport));
        assert!(registry.try_enter(user, MenuKind::ApplicationConfig).is_none());

        // 他のユーザは影響を受けない
        let other = registry.try_enter(UserId::new(2), MenuKind::ApplicationConfig);
        assert!(other.is_some());
        assert_eq!(registry.len(), 2);

        drop(guard);
        assert_eq!(registry.current(user), None);
        assert!(registry.try_enter(user, MenuKind::ApplicationConfig).is_some());
    }
}
