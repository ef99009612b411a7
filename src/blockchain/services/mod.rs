// src/blockchain/services/mod.rs

pub mod address;
pub mod balance;
pub mod contract;
pub mod cost;
pub mod fees;
pub mod health;
pub mod proxy;
