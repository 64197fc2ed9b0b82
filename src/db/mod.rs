// Durable storage gateways
pub mod postgres;

pub use postgres::PostgresStore;
