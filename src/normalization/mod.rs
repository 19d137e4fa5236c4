pub mod movie;

pub use movie::normalize_movie;
