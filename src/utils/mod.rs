pub mod prompt;
pub mod validator;
