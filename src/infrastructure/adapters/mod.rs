//! Host adapters - where outbound actions end up

pub mod console;
