// Command-line surface: the clap parser and its value types.
pub mod cmd_enums;
pub mod type_enums;
