//! `guocedb-server` binds a client connection to the storage engine:
//! the session/dispatcher lifecycle, layered over
//! [`guocedb_storage::engine::RelationalEngine`]. It knows nothing
//! about MySQL wire bytes or SQL text — those are out of scope — so
//! the "connection" here is a line-oriented admin console, and
//! statements are the small planner-neutral [`command::Statement`]
//! tree the dispatcher already knows how to run. A real wire
//! front-end would decode MySQL packets into the same `Statement`
//! tree and call the same `Session::dispatch`.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ ./guocedb-server
//!
//! Welcome to guocedb.
//!
//! guocedb > CREATE DATABASE shop;
//! guocedb > USE shop;
//! guocedb [shop] > CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(100));
//! guocedb [shop] > INSERT INTO users VALUES (1, 'Alice');
//! guocedb [shop] > SELECT * FROM users WHERE id = 1;
//! ```

pub mod ast;
pub mod command;
pub mod config;
pub mod rusty;
pub mod session;
pub mod show;
pub mod trace;
