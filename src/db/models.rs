use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed string enums stored as TEXT columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(Role {
    Free => "free",
    Premium => "premium",
    Business => "business",
    Admin => "admin",
});

text_enum!(ItemKind {
    Link => "link",
    File => "file",
    Email => "email",
});

text_enum!(ComponentKind {
    Text => "text",
    Link => "link",
    Social => "social",
    Image => "image",
    Video => "video",
    Contact => "contact",
});

text_enum!(SubscriptionStatus {
    Active => "active",
    Cancelled => "cancelled",
});

text_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub photo_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub photo_path: Option<String>,
    pub template_id: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub text_color: String,
    pub is_public: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_protected: bool,
    pub views: i64,
    pub shares: i64,
    pub downloads: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardComponent {
    pub id: String,
    pub card_id: String,
    pub kind: ComponentKind,
    pub title: Option<String>,
    pub content: Option<String>,
    pub settings: serde_json::Value,
    pub position: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub layout: String,
    pub color_scheme: serde_json::Value,
    pub components: serde_json::Value,
    pub is_premium: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BioLink {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub avatar_path: Option<String>,
    pub background_path: Option<String>,
    pub background_color: String,
    pub text_color: String,
    pub button_color: String,
    pub button_text_color: String,
    pub font_family: String,
    pub button_style: String,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_protected: bool,
    pub views: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BioLinkItem {
    pub id: String,
    pub bio_link_id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub icon: Option<String>,
    pub position: i64,
    pub is_active: bool,
    pub clicks: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BioLinkSocial {
    pub id: String,
    pub bio_link_id: String,
    pub platform: String,
    pub url: String,
    pub position: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub started_at: String,
    pub ends_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: String,
    pub card_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub scheduled_at: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Parse a JSON TEXT column, tolerating legacy/invalid contents.
pub(crate) fn json_column(raw: String, fallback: serde_json::Value) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("premium".parse::<Role>().unwrap(), Role::Premium);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn item_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ItemKind::Email).unwrap();
        assert_eq!(json, "\"email\"");
        let kind: ItemKind = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(kind, ItemKind::File);
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$2b$secret".into(),
            role: Role::Free,
            photo_path: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "free");
    }

    #[test]
    fn json_column_falls_back_on_garbage() {
        let value = json_column("not json".into(), serde_json::json!({}));
        assert_eq!(value, serde_json::json!({}));
    }
}
