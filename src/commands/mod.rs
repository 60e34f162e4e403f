pub mod guild;
pub mod reply;
