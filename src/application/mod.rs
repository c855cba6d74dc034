pub mod dto;
pub mod error;
pub mod selector;
pub mod service;
