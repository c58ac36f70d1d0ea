//! Append-only view/click logs and the counters they feed.
//!
//! Every `record_*` call appends exactly one row and bumps exactly one
//! counter, inside one transaction.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::user_agent::{self, ClientInfo};

/// Who hit a public page.
#[derive(Debug, Clone)]
pub struct Visit {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub client: ClientInfo,
}

impl Visit {
    pub fn new(ip: Option<String>, user_agent: Option<String>, referrer: Option<String>) -> Self {
        let client = user_agent::parse(user_agent.as_deref().unwrap_or(""));
        Self {
            ip,
            user_agent,
            referrer,
            client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    View,
    Share,
    Download,
}

impl CardAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardAction::View => "view",
            CardAction::Share => "share",
            CardAction::Download => "download",
        }
    }

    fn counter_update(&self) -> &'static str {
        match self {
            CardAction::View => "UPDATE cards SET views = views + 1 WHERE id = ?1",
            CardAction::Share => "UPDATE cards SET shares = shares + 1 WHERE id = ?1",
            CardAction::Download => "UPDATE cards SET downloads = downloads + 1 WHERE id = ?1",
        }
    }
}

const INSERT_BIO_EVENT: &str = "INSERT INTO bio_link_analytics
    (bio_link_id, bio_link_item_id, action, ip_address, user_agent, referrer, device, browser, os)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

pub fn record_bio_view(conn: &mut Connection, bio_link_id: &str, visit: &Visit) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        INSERT_BIO_EVENT,
        params![
            bio_link_id,
            Option::<String>::None,
            "view",
            visit.ip,
            visit.user_agent,
            visit.referrer,
            visit.client.device,
            visit.client.browser,
            visit.client.os,
        ],
    )?;
    tx.execute(
        "UPDATE bio_links SET views = views + 1 WHERE id = ?1",
        params![bio_link_id],
    )?;
    tx.commit()
}

pub fn record_bio_click(
    conn: &mut Connection,
    bio_link_id: &str,
    item_id: &str,
    visit: &Visit,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        INSERT_BIO_EVENT,
        params![
            bio_link_id,
            item_id,
            "click",
            visit.ip,
            visit.user_agent,
            visit.referrer,
            visit.client.device,
            visit.client.browser,
            visit.client.os,
        ],
    )?;
    tx.execute(
        "UPDATE bio_link_items SET clicks = clicks + 1 WHERE id = ?1",
        params![item_id],
    )?;
    tx.commit()
}

pub fn record_card_event(
    conn: &mut Connection,
    card_id: &str,
    action: CardAction,
    visit: &Visit,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO card_analytics (card_id, action, ip_address, user_agent, referrer, device, browser, os)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            card_id,
            action.as_str(),
            visit.ip,
            visit.user_agent,
            visit.referrer,
            visit.client.device,
            visit.client.browser,
            visit.client.os,
        ],
    )?;
    tx.execute(action.counter_update(), params![card_id])?;
    tx.commit()
}

/// Zero the counters; the event log is kept.
pub fn reset_bio_link(conn: &mut Connection, bio_link_id: &str) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE bio_links SET views = 0 WHERE id = ?1",
        params![bio_link_id],
    )?;
    tx.execute(
        "UPDATE bio_link_items SET clicks = 0 WHERE bio_link_id = ?1",
        params![bio_link_id],
    )?;
    tx.commit()
}

pub fn reset_card(conn: &Connection, card_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE cards SET views = 0, shares = 0, downloads = 0 WHERE id = ?1",
        params![card_id],
    )?;
    Ok(())
}

// --- Aggregates ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Count {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyActions {
    pub date: String,
    pub actions: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Breakdown {
    pub unique_visitors: i64,
    pub by_device: Vec<Count>,
    pub by_browser: Vec<Count>,
    pub by_os: Vec<Count>,
    pub top_referrers: Vec<Count>,
    pub daily: Vec<DailyActions>,
    pub period_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemClicks {
    pub id: String,
    pub title: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BioLinkStats {
    pub views: i64,
    pub clicks: i64,
    pub items: Vec<ItemClicks>,
    #[serde(flatten)]
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardStats {
    pub views: i64,
    pub shares: i64,
    pub downloads: i64,
    #[serde(flatten)]
    pub breakdown: Breakdown,
}

/// Event log a breakdown reads from; table and key names are fixed here, never user input.
#[derive(Clone, Copy)]
struct EventLog {
    table: &'static str,
    key: &'static str,
}

const BIO_LOG: EventLog = EventLog {
    table: "bio_link_analytics",
    key: "bio_link_id",
};

const CARD_LOG: EventLog = EventLog {
    table: "card_analytics",
    key: "card_id",
};

fn window(days: u32) -> String {
    format!("-{} days", days)
}

fn group_counts(
    conn: &Connection,
    log: EventLog,
    expr: &str,
    id: &str,
    days: u32,
    limit: i64,
) -> rusqlite::Result<Vec<Count>> {
    let sql = format!(
        "SELECT {expr} AS label, COUNT(*) AS n FROM {table}
         WHERE {key} = ?1 AND created_at >= datetime('now', ?2)
         GROUP BY label ORDER BY n DESC, label ASC LIMIT ?3",
        expr = expr,
        table = log.table,
        key = log.key,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![id, window(days), limit], |row| {
        Ok(Count {
            label: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn daily(conn: &Connection, log: EventLog, id: &str, days: u32) -> rusqlite::Result<Vec<DailyActions>> {
    let sql = format!(
        "SELECT date(created_at) AS day, action, COUNT(*) FROM {table}
         WHERE {key} = ?1 AND created_at >= datetime('now', ?2)
         GROUP BY day, action ORDER BY day ASC",
        table = log.table,
        key = log.key,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![id, window(days)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut days_out: Vec<DailyActions> = Vec::new();
    for row in rows {
        let (date, action, count) = row?;
        match days_out.last_mut() {
            Some(last) if last.date == date => {
                last.actions.insert(action, count);
            }
            _ => {
                let mut actions = BTreeMap::new();
                actions.insert(action, count);
                days_out.push(DailyActions { date, actions });
            }
        }
    }
    Ok(days_out)
}

fn breakdown(conn: &Connection, log: EventLog, id: &str, days: u32) -> rusqlite::Result<Breakdown> {
    let unique_visitors: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT ip_address) FROM {} WHERE {} = ?1 AND created_at >= datetime('now', ?2)",
            log.table, log.key
        ),
        params![id, window(days)],
        |row| row.get(0),
    )?;

    Ok(Breakdown {
        unique_visitors,
        by_device: group_counts(conn, log, "device", id, days, 10)?,
        by_browser: group_counts(conn, log, "browser", id, days, 10)?,
        by_os: group_counts(conn, log, "os", id, days, 10)?,
        top_referrers: group_counts(
            conn,
            log,
            "COALESCE(NULLIF(referrer, ''), 'direct')",
            id,
            days,
            10,
        )?,
        daily: daily(conn, log, id, days)?,
        period_days: days,
    })
}

pub fn bio_link_stats(conn: &Connection, bio_link_id: &str, days: u32) -> rusqlite::Result<BioLinkStats> {
    let views: i64 = conn.query_row(
        "SELECT views FROM bio_links WHERE id = ?1",
        params![bio_link_id],
        |row| row.get(0),
    )?;

    let items = {
        let mut stmt = conn.prepare(
            "SELECT id, title, clicks FROM bio_link_items WHERE bio_link_id = ?1
             ORDER BY clicks DESC, position ASC",
        )?;
        let rows = stmt.query_map(params![bio_link_id], |row| {
            Ok(ItemClicks {
                id: row.get(0)?,
                title: row.get(1)?,
                clicks: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let clicks = items.iter().map(|i| i.clicks).sum();

    Ok(BioLinkStats {
        views,
        clicks,
        items,
        breakdown: breakdown(conn, BIO_LOG, bio_link_id, days)?,
    })
}

pub fn card_stats(conn: &Connection, card_id: &str, days: u32) -> rusqlite::Result<CardStats> {
    let (views, shares, downloads): (i64, i64, i64) = conn.query_row(
        "SELECT views, shares, downloads FROM cards WHERE id = ?1",
        params![card_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(CardStats {
        views,
        shares,
        downloads,
        breakdown: breakdown(conn, CARD_LOG, card_id, days)?,
    })
}

/// Platform-wide totals for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformTotals {
    pub users: i64,
    pub cards: i64,
    pub bio_links: i64,
    pub card_views: i64,
    pub bio_link_views: i64,
    pub bio_link_clicks: i64,
    pub active_subscriptions: i64,
    pub users_by_role: Vec<Count>,
}

pub fn platform_totals(conn: &Connection) -> rusqlite::Result<PlatformTotals> {
    let scalar = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };

    let users_by_role = {
        let mut stmt =
            conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")?;
        let rows = stmt.query_map([], |row| {
            Ok(Count {
                label: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(PlatformTotals {
        users: scalar("SELECT COUNT(*) FROM users")?,
        cards: scalar("SELECT COUNT(*) FROM cards")?,
        bio_links: scalar("SELECT COUNT(*) FROM bio_links")?,
        card_views: scalar("SELECT COALESCE(SUM(views), 0) FROM cards")?,
        bio_link_views: scalar("SELECT COALESCE(SUM(views), 0) FROM bio_links")?,
        bio_link_clicks: scalar("SELECT COALESCE(SUM(clicks), 0) FROM bio_link_items")?,
        active_subscriptions: scalar("SELECT COUNT(*) FROM subscriptions WHERE status = 'active'")?,
        users_by_role,
    })
}
