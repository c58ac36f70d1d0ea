//! Ownership checks. Each loader returns 404 for a missing row and 403 for
//! someone else's, before any side effect happens.

use rusqlite::Connection;

use crate::db::models::{Appointment, BioLink, BioLinkItem, BioLinkSocial, Card, CardComponent};
use crate::db::{appointments, bio_links, cards};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

pub fn ensure_owner(user: &CurrentUser, owner_id: &str) -> AppResult<()> {
    if user.id() == owner_id {
        Ok(())
    } else {
        Err(AppError::forbidden("This action is unauthorized."))
    }
}

pub fn owned_card(conn: &Connection, user: &CurrentUser, id: &str) -> AppResult<Card> {
    let card = cards::find(conn, id)?.ok_or(AppError::NotFound)?;
    ensure_owner(user, &card.user_id)?;
    Ok(card)
}

pub fn owned_component(
    conn: &Connection,
    user: &CurrentUser,
    id: &str,
) -> AppResult<(CardComponent, Card)> {
    let component = cards::find_component(conn, id)?.ok_or(AppError::NotFound)?;
    let card = owned_card(conn, user, &component.card_id)?;
    Ok((component, card))
}

pub fn owned_bio_link(conn: &Connection, user: &CurrentUser, id: &str) -> AppResult<BioLink> {
    let bio_link = bio_links::find(conn, id)?.ok_or(AppError::NotFound)?;
    ensure_owner(user, &bio_link.user_id)?;
    Ok(bio_link)
}

pub fn owned_item(
    conn: &Connection,
    user: &CurrentUser,
    id: &str,
) -> AppResult<(BioLinkItem, BioLink)> {
    let item = bio_links::find_item(conn, id)?.ok_or(AppError::NotFound)?;
    let bio_link = owned_bio_link(conn, user, &item.bio_link_id)?;
    Ok((item, bio_link))
}

pub fn owned_social(
    conn: &Connection,
    user: &CurrentUser,
    id: &str,
) -> AppResult<(BioLinkSocial, BioLink)> {
    let social = bio_links::find_social(conn, id)?.ok_or(AppError::NotFound)?;
    let bio_link = owned_bio_link(conn, user, &social.bio_link_id)?;
    Ok((social, bio_link))
}

pub fn owned_appointment(
    conn: &Connection,
    user: &CurrentUser,
    id: &str,
) -> AppResult<Appointment> {
    let appointment = appointments::find(conn, id)?.ok_or(AppError::NotFound)?;
    ensure_owner(user, &appointment.user_id)?;
    Ok(appointment)
}
