pub mod health;
pub mod unsubscribe;
