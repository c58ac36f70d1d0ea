//! Static subscription plan catalog and the feature gates built on it.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::models::{Role, User};
use crate::db::subscriptions;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Limits {
    /// `None` means unlimited.
    pub max_cards: Option<u32>,
    pub max_bio_links: Option<u32>,
    pub max_items_per_bio_link: Option<u32>,
    pub storage_mb: u64,
    pub analytics_days: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Features {
    pub premium_templates: bool,
    pub custom_domain: bool,
    pub password_protection: bool,
    pub remove_branding: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Plan {
    pub slug: &'static str,
    pub name: &'static str,
    pub price_cents: u32,
    pub role: Role,
    pub limits: Limits,
    pub features: Features,
}

pub const FREE: Plan = Plan {
    slug: "free",
    name: "Free",
    price_cents: 0,
    role: Role::Free,
    limits: Limits {
        max_cards: Some(1),
        max_bio_links: Some(1),
        max_items_per_bio_link: Some(5),
        storage_mb: 10,
        analytics_days: 7,
    },
    features: Features {
        premium_templates: false,
        custom_domain: false,
        password_protection: false,
        remove_branding: false,
    },
};

pub const PREMIUM: Plan = Plan {
    slug: "premium",
    name: "Premium",
    price_cents: 900,
    role: Role::Premium,
    limits: Limits {
        max_cards: Some(5),
        max_bio_links: Some(5),
        max_items_per_bio_link: Some(50),
        storage_mb: 250,
        analytics_days: 30,
    },
    features: Features {
        premium_templates: true,
        custom_domain: false,
        password_protection: true,
        remove_branding: true,
    },
};

pub const BUSINESS: Plan = Plan {
    slug: "business",
    name: "Business",
    price_cents: 2900,
    role: Role::Business,
    limits: Limits {
        max_cards: None,
        max_bio_links: None,
        max_items_per_bio_link: None,
        storage_mb: 2048,
        analytics_days: 90,
    },
    features: Features {
        premium_templates: true,
        custom_domain: true,
        password_protection: true,
        remove_branding: true,
    },
};

pub const PLANS: &[Plan] = &[FREE, PREMIUM, BUSINESS];

pub fn find(slug: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.slug == slug)
}

/// Plan whose limits apply to `user`: the active subscription's, or free.
/// Admins get the top tier whatever they pay for.
pub fn plan_for(conn: &Connection, user: &User) -> rusqlite::Result<&'static Plan> {
    if user.role == Role::Admin {
        return Ok(&BUSINESS);
    }
    let active = subscriptions::active_for_user(conn, &user.id)?;
    Ok(active
        .and_then(|subscription| find(&subscription.plan))
        .unwrap_or(&FREE))
}

impl Plan {
    /// Monthly price as shown on the pricing table.
    pub fn price_label(&self) -> String {
        if self.price_cents == 0 {
            "Free".to_string()
        } else {
            format!("${}.{:02}/mo", self.price_cents / 100, self.price_cents % 100)
        }
    }

    pub fn storage_bytes(&self) -> u64 {
        self.limits.storage_mb * 1024 * 1024
    }

    /// 403 when creating one more would exceed `limit`.
    pub fn check_count(&self, what: &str, current: i64, limit: Option<u32>) -> AppResult<()> {
        match limit {
            Some(max) if current >= i64::from(max) => Err(AppError::forbidden(format!(
                "Your {} plan allows at most {} {}. Upgrade to add more.",
                self.name, max, what
            ))),
            _ => Ok(()),
        }
    }

    pub fn require_premium_templates(&self) -> AppResult<()> {
        if self.features.premium_templates {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Premium templates are not available on the {} plan.",
                self.name
            )))
        }
    }

    pub fn require_password_protection(&self) -> AppResult<()> {
        if self.features.password_protection {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Password protection is not available on the {} plan.",
                self.name
            )))
        }
    }
}
