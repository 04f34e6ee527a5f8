pub mod labour_import;
pub mod notifications;
pub mod requirements;
