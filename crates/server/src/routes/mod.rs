pub mod game_ws;
pub mod health;
