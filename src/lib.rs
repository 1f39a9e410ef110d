use crate::config::config::Config;
use crate::repository::database::Database;
use crate::service::ScoringService;

pub mod config;
pub mod controller;
pub mod model;
pub mod repository;
pub mod service;
pub mod util;

pub struct AppState {
    pub service: ScoringService<Database>,
    pub config: Config,
}
