pub mod changes_macros;
