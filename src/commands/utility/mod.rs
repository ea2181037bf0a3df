pub mod converter;
