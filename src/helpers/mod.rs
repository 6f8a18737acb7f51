pub mod events;
pub mod message_parser;
