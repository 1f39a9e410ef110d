pub mod challenge;
pub mod error;
pub mod fixture;
pub mod innings;
pub mod response;
pub mod rows;
pub mod schema;
pub mod stats;
pub mod team;
pub mod tournament;
