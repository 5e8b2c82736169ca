pub mod betting;
pub mod cache;
pub mod cli;
pub mod computer_player;
pub mod config;
pub mod display;
pub mod error;
pub mod game;
pub mod model;
pub mod monte_carlo;
pub mod odds;
pub mod play;
pub mod probability;
pub mod teams;
pub mod wager;
