pub mod health;
pub mod materials;
pub mod speech;
