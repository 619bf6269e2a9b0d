#![allow(dead_code)]

pub mod sqlite;
pub mod temp_db;
