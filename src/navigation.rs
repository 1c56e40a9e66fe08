// src/navigation.rs

//! Client page model. One value holds the current page and who is signed
//! in; pages change only through `Navigator::transition`.

use serde::Serialize;

use crate::models::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "page", content = "examId", rename_all = "kebab-case")]
pub enum Page {
    Login,
    Register,
    Dashboard,
    CreateExam,
    TakeExam(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    LoggedIn(Role),
    LoggedOut,
    GoTo(Page),
    /// The exam session ended, submitted or abandoned.
    SessionFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    page: Page,
    role: Option<Role>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            page: Page::Login,
            role: None,
        }
    }
}

impl Navigator {
    pub fn page(&self) -> Page {
        self.page
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_authenticated(&self) -> bool {
        self.role.is_some()
    }

    /// Pure transition: returns the next navigator and leaves `self` as is.
    pub fn transition(&self, event: NavEvent) -> Navigator {
        match event {
            NavEvent::LoggedIn(role) => Navigator {
                page: Page::Dashboard,
                role: Some(role),
            },
            NavEvent::LoggedOut => Navigator::default(),
            NavEvent::SessionFinished => match self.role {
                Some(_) => Navigator {
                    page: Page::Dashboard,
                    ..*self
                },
                None => Navigator::default(),
            },
            NavEvent::GoTo(target) => Navigator {
                page: self.resolve(target),
                ..*self
            },
        }
    }

    fn resolve(&self, target: Page) -> Page {
        match (self.role, target) {
            (None, Page::Login | Page::Register) => target,
            (None, _) => Page::Login,
            (Some(_), Page::Login | Page::Register) => Page::Dashboard,
            (Some(role), Page::CreateExam) if !role.is_privileged() => Page::Dashboard,
            (Some(_), _) => target,
        }
    }
}
