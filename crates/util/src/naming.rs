//! Naming conventions shared by flow generation and the config store.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Canonical state name for a function: `hello_world` becomes `HelloWorld`.
pub fn state_name(function_name: &str) -> String {
    function_name.to_upper_camel_case()
}

/// Config section for a client type name: `HelloClient` becomes `hello_client`.
pub fn section_name(client_name: &str) -> String {
    client_name.to_snake_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_upper_camel_case() {
        assert_eq!(state_name("mock_func"), "MockFunc");
        assert_eq!(state_name("hello_world"), "HelloWorld");
        assert_eq!(state_name("encrypt"), "Encrypt");
    }

    #[test]
    fn sections_are_snake_case() {
        assert_eq!(section_name("HelloClient"), "hello_client");
        assert_eq!(section_name("MockGladierClient"), "mock_gladier_client");
    }
}
