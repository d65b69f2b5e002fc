pub mod attendance;
pub mod badge;
pub mod leave;
pub mod points;
pub mod reward;
pub mod role;
