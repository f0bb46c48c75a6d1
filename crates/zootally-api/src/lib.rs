//! JSON API for zootally.
//!
//! Exposes an axum [`Router`] backed by any [`CountStore`]. Handlers read the
//! clock once per request and pass the derived day into the store; nothing
//! below this layer consults a clock.

pub mod enclosures;
pub mod error;
pub mod observations;
pub mod registry;
pub mod subjects;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use zootally_core::{calendar::calendar_day, store::CountStore};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ZOOTALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:        String,
  #[serde(default = "default_port")]
  pub port:        u16,
  #[serde(default = "default_store_path")]
  pub store_path:  PathBuf,
  /// Zone calendar days are derived in.
  #[serde(default = "default_time_zone")]
  pub time_zone:   Tz,
  /// Trailing window length when a request does not name one.
  #[serde(default = "default_window_days")]
  pub window_days: i64,
  /// History page size.
  #[serde(default = "default_page_size")]
  pub page_size:   usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/zootally/zootally.db") }
fn default_time_zone() -> Tz { Tz::UTC }
fn default_window_days() -> i64 { 3 }
fn default_page_size() -> usize { 10 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:        default_host(),
      port:        default_port(),
      store_path:  default_store_path(),
      time_zone:   default_time_zone(),
      window_days: default_window_days(),
      page_size:   default_page_size(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: CountStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

impl<S: CountStore> AppState<S> {
  /// The calendar day `now` falls on for this store.
  pub fn day_of(&self, now: DateTime<Utc>) -> NaiveDate {
    calendar_day(now, self.store.time_zone())
  }

  /// `day` if the caller named one, otherwise today.
  pub fn day_or_today(&self, day: Option<NaiveDate>) -> NaiveDate {
    day.unwrap_or_else(|| self.day_of(Utc::now()))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: CountStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Enclosures
    .route("/enclosures", get(enclosures::list::<S>).post(enclosures::create::<S>))
    .route("/enclosures/{id}", delete(enclosures::delete_one::<S>))
    .route("/enclosures/{id}/roster", get(enclosures::roster::<S>))
    .route("/enclosures/{id}/counts", get(enclosures::counts::<S>))
    .route("/enclosures/{id}/species-counts", get(enclosures::species_counts::<S>))
    // Registry
    .route("/species", post(registry::create_species::<S>))
    .route("/individuals", post(registry::create_individual::<S>))
    .route("/groups", post(registry::create_group::<S>))
    .route("/users", post(registry::create_user::<S>))
    .route("/users/{id}", delete(registry::delete_user::<S>))
    // Observations
    .route("/observations", post(observations::upsert::<S>))
    // Subjects
    .route(
      "/subjects/{kind}/{id}",
      get(subjects::get_one::<S>).delete(subjects::delete_one::<S>),
    )
    .route("/subjects/{kind}/{id}/active", put(subjects::set_active::<S>))
    .route("/subjects/{kind}/{id}/enclosure", put(subjects::assign::<S>))
    .route("/subjects/{kind}/{id}/observation", get(subjects::resolve::<S>))
    .route("/subjects/{kind}/{id}/window", get(subjects::window::<S>))
    .route("/subjects/{kind}/{id}/history", get(subjects::history::<S>))
    .route("/individuals/{id}/conditions", get(subjects::conditions::<S>))
    .with_state(state)
}
