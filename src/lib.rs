pub mod bot;
pub mod collector;
pub mod menus;
pub mod models;
pub mod platform;
pub mod services;
pub mod session;
