//! OAuth login. Establishes the cookie session that the chat socket reads.

use axum::{routing::get, Router};
use rand::seq::IndexedRandom;
use sqlx::SqlitePool;

use crate::{db, AppState};

mod clients;
mod login;
mod lockin;
mod logout;

pub use clients::{ClientProvider, Clients};

const ADJECTIVES: [&str; 25] = [
    "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
    "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
    "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
];

const NOUNS: [&str; 24] = [
    "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
    "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
    "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}

pub(crate) fn random_alias() -> String {
    let mut rng = rand::rng();
    format!(
        "{} {}",
        ADJECTIVES.choose(&mut rng).copied().unwrap_or("Nameless"),
        NOUNS.choose(&mut rng).copied().unwrap_or("User"),
    )
}

/// Makes sure `user_id` has a row in `users`, giving first-time users a random alias.
pub async fn ensure_user(db_pool: &SqlitePool, user_id: &str) -> Result<(), sqlx::Error> {
    let alias = random_alias();
    if db::insert_user(db_pool, user_id, &alias).await? {
        tracing::info!(user = user_id, alias = %alias, "created user");
    }
    Ok(())
}
