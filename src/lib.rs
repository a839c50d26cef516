//! Backend for a small link board. Articles nest under each other as
//! replies, users vote and react, and access control runs through a
//! database-backed permission catalog checked on every request.

pub mod app_config;
pub mod article;
pub mod db;
pub mod middleware;
pub mod notifications;
pub mod orm;
pub mod permission;
pub mod session;
pub mod settings;
pub mod user;
pub mod web;
