pub mod catalog;
pub mod combat;
pub mod config;
pub mod economy;
pub mod entity;
pub mod events;
pub mod game;
pub mod geometry;
pub mod gold;
pub mod grid;
pub mod health;
pub mod movement;
pub mod pathfinder;
pub mod server;
pub mod skill;
pub mod slot;
